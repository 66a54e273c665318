/// Structure file format recognized by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Pdb,
    Cif,
}

impl StructureFormat {
    pub fn label(&self) -> &'static str {
        match self {
            StructureFormat::Pdb => "pdb",
            StructureFormat::Cif => "cif",
        }
    }
}

const PDB_RECORDS: &[&str] = &[
    "HEADER", "TITLE", "COMPND", "REMARK", "ATOM", "HETATM", "MODEL", "SEQRES",
];

/// Sniffs the structure format from the head of the payload. Unknown
/// content yields `None`; the caller serializes that as a null format
/// without failing the request.
pub fn detect_structure_format(text: &str) -> Option<StructureFormat> {
    for line in text.lines().take(50) {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with("data_") || line.starts_with("_atom_site.") || line.starts_with("loop_")
        {
            return Some(StructureFormat::Cif);
        }
        if PDB_RECORDS
            .iter()
            .any(|rec| line.starts_with(rec) && line.len() > rec.len())
            || PDB_RECORDS.contains(&line)
        {
            return Some(StructureFormat::Pdb);
        }
    }
    None
}
