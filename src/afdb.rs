use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::AcquisitionError;

pub const DEFAULT_AFDB_BASE_URL: &str = "https://alphafold.ebi.ac.uk/api/prediction";

/// PAE document plus structure payload for one accession. The accession
/// path requires both halves; a missing half is a terminal acquisition
/// failure, never a partial result.
#[derive(Debug, Clone)]
pub struct PredictionData {
    pub pae_json: Vec<u8>,
    pub structure: String,
}

/// Seam for the remote structure database, so the pipeline can be driven
/// by a stub in tests.
pub trait StructureDatabase {
    fn fetch(&self, accession: &str) -> Result<PredictionData, AcquisitionError>;
}

/// One entry of the AFDB prediction metadata document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionEntry {
    #[serde(default)]
    pub pae_doc_url: Option<String>,
    #[serde(default)]
    pub pdb_url: Option<String>,
    #[serde(default)]
    pub cif_url: Option<String>,
}

/// Picks the PAE document URL and a structure URL (PDB preferred over
/// mmCIF) from the first metadata entry.
pub fn resolve_prediction_urls(entries: &[PredictionEntry]) -> Option<(String, String)> {
    let first = entries.first()?;
    let pae = first.pae_doc_url.clone()?;
    let structure = first.pdb_url.clone().or_else(|| first.cif_url.clone())?;
    Some((pae, structure))
}

/// Accessions are matched case-insensitively by the database; normalize to
/// the canonical uppercase form before they become cache identity bytes.
pub fn normalize_accession(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Blocking AFDB client. Every request carries an explicit timeout;
/// expiry maps to a distinct error kind and is terminal, never retried.
pub struct AfdbClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl AfdbClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AcquisitionError::Fetch {
                url: String::new(),
                message: format!("could not build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                AcquisitionError::Timeout {
                    url: url.to_string(),
                }
            } else {
                AcquisitionError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|e| {
            if e.is_timeout() {
                AcquisitionError::Timeout {
                    url: url.to_string(),
                }
            } else {
                AcquisitionError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;
        Ok(bytes.to_vec())
    }
}

impl StructureDatabase for AfdbClient {
    fn fetch(&self, accession: &str) -> Result<PredictionData, AcquisitionError> {
        let accession = normalize_accession(accession);
        let metadata_url = format!("{}/{}", self.base_url, accession);

        let metadata = match self.get_bytes(&metadata_url) {
            Ok(bytes) => bytes,
            Err(AcquisitionError::Status { status: 404, .. }) => {
                return Err(AcquisitionError::NotFound(accession));
            }
            Err(e) => return Err(e),
        };
        let entries: Vec<PredictionEntry> = serde_json::from_slice(&metadata).map_err(|e| {
            AcquisitionError::Fetch {
                url: metadata_url.clone(),
                message: format!("malformed prediction metadata: {e}"),
            }
        })?;
        let Some((pae_url, structure_url)) = resolve_prediction_urls(&entries) else {
            return Err(AcquisitionError::NotFound(accession));
        };
        debug!(%accession, %pae_url, %structure_url, "resolved prediction URLs");

        let pae_json = self.get_bytes(&pae_url)?;
        let structure_bytes = self.get_bytes(&structure_url)?;
        let structure =
            String::from_utf8(structure_bytes).map_err(|_| AcquisitionError::StructureNotUtf8)?;

        Ok(PredictionData {
            pae_json,
            structure,
        })
    }
}
