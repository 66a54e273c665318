use serde_json::Value;

use crate::error::{NormalizationError, ValidationError};

/// Dense row-major matrix of predicted aligned errors.
///
/// Built once per request from one of three source encodings (see
/// [`normalize`]), checked by [`validate`], then handed to clustering and
/// discarded. Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PaeMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl PaeMatrix {
    /// Builds a matrix from nested rows. Rows of unequal length are rejected.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, NormalizationError> {
        let expected = rows.first().map(|r| r.len()).unwrap_or(0);
        for (row, r) in rows.iter().enumerate() {
            if r.len() != expected {
                return Err(NormalizationError::RaggedMatrix {
                    row,
                    len: r.len(),
                    expected,
                });
            }
        }
        let n_rows = rows.len();
        let values: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Self {
            rows: n_rows,
            cols: expected,
            values,
        })
    }

    fn zeros(n: usize) -> Self {
        Self {
            rows: n,
            cols: n,
            values: vec![0.0; n * n],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Residue count; only meaningful for a validated (square) matrix.
    pub fn n_residues(&self) -> usize {
        self.rows
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.cols + col] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Decodes raw PAE bytes into a dense matrix, tolerating the three known
/// source encodings in fixed priority order:
///
/// 1. a list wrapping the real document (legacy), unwrapped to its first
///    element first;
/// 2. a sparse triplet of parallel `residue1`/`residue2`/`distance` arrays,
///    detected by the presence of a `distance` key;
/// 3. a dense nested array under `predicted_aligned_error`, falling back to
///    `pae`.
///
/// Once a variant is detected, no other variant is attempted. Input that
/// matches none of the three fails in the dense branch with `MissingField`.
pub fn normalize(raw: &[u8]) -> Result<PaeMatrix, NormalizationError> {
    let mut doc: Value = serde_json::from_slice(raw)?;

    if let Value::Array(items) = doc {
        doc = items
            .into_iter()
            .next()
            .ok_or(NormalizationError::EmptyDocument)?;
    }
    let Value::Object(map) = &doc else {
        return Err(NormalizationError::NotAnObject);
    };

    if map.contains_key("distance") {
        return normalize_sparse(map);
    }

    let dense = map
        .get("predicted_aligned_error")
        .or_else(|| map.get("pae"))
        .ok_or(NormalizationError::MissingField)?;
    normalize_dense(dense)
}

fn normalize_sparse(map: &serde_json::Map<String, Value>) -> Result<PaeMatrix, NormalizationError> {
    let residue1 = sparse_index_array(map, "residue1")?;
    let residue2 = sparse_index_array(map, "residue2")?;
    let distance = sparse_value_array(map)?;

    if residue1.len() != residue2.len() || residue1.len() != distance.len() {
        return Err(NormalizationError::SparseArityMismatch {
            residue1: residue1.len(),
            residue2: residue2.len(),
            distance: distance.len(),
        });
    }
    let n = match residue1.iter().max() {
        Some(max) => max + 1,
        None => return Err(NormalizationError::EmptySparse),
    };

    // Cells the triplets never visit stay zero; the sparse format only
    // encodes populated pairs.
    let mut matrix = PaeMatrix::zeros(n);
    for ((&r, &c), &v) in residue1.iter().zip(&residue2).zip(&distance) {
        if c >= n {
            return Err(NormalizationError::SparseIndexOutOfRange { index: c, size: n });
        }
        matrix.set(r, c, v);
    }
    Ok(matrix)
}

fn sparse_index_array(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Vec<usize>, NormalizationError> {
    let Some(Value::Array(items)) = map.get(key) else {
        return Err(NormalizationError::MissingField);
    };
    items
        .iter()
        .enumerate()
        .map(|(col, item)| {
            item.as_u64()
                .map(|v| v as usize)
                .ok_or(NormalizationError::NonNumericEntry { row: 0, col })
        })
        .collect()
}

fn sparse_value_array(
    map: &serde_json::Map<String, Value>,
) -> Result<Vec<f64>, NormalizationError> {
    let Some(Value::Array(items)) = map.get("distance") else {
        return Err(NormalizationError::MissingField);
    };
    items
        .iter()
        .enumerate()
        .map(|(col, item)| {
            item.as_f64()
                .ok_or(NormalizationError::NonNumericEntry { row: 0, col })
        })
        .collect()
}

fn normalize_dense(dense: &Value) -> Result<PaeMatrix, NormalizationError> {
    let Value::Array(raw_rows) = dense else {
        return Err(NormalizationError::NotTwoDimensional);
    };
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(raw_rows.len());
    for (row_idx, raw_row) in raw_rows.iter().enumerate() {
        let Value::Array(cells) = raw_row else {
            return Err(NormalizationError::NotTwoDimensional);
        };
        let mut row = Vec::with_capacity(cells.len());
        for (col, cell) in cells.iter().enumerate() {
            let v = cell.as_f64().ok_or(NormalizationError::NonNumericEntry {
                row: row_idx,
                col,
            })?;
            row.push(v);
        }
        rows.push(row);
    }
    PaeMatrix::from_rows(rows)
}

/// Structural invariants over a normalized matrix: square, all entries
/// non-negative and finite. Pure predicate, no side effects.
pub fn validate(matrix: &PaeMatrix) -> Result<(), ValidationError> {
    if matrix.rows() != matrix.cols() {
        return Err(ValidationError::NotSquare {
            rows: matrix.rows(),
            cols: matrix.cols(),
        });
    }
    for (idx, &v) in matrix.values().iter().enumerate() {
        let (row, col) = (idx / matrix.cols().max(1), idx % matrix.cols().max(1));
        if v < 0.0 {
            return Err(ValidationError::NegativeValue { row, col });
        }
        if !v.is_finite() {
            return Err(ValidationError::NonFiniteValue { row, col });
        }
    }
    Ok(())
}
