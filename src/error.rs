use thiserror::Error;

/// A raw PAE document could not be turned into a dense matrix.
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("Could not decode PAE document as JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("PAE document is an empty list")]
    EmptyDocument,

    #[error("PAE document is not a JSON object")]
    NotAnObject,

    #[error(
        "Sparse PAE arrays have mismatched lengths: residue1={residue1}, residue2={residue2}, distance={distance}"
    )]
    SparseArityMismatch {
        residue1: usize,
        residue2: usize,
        distance: usize,
    },

    #[error("Sparse PAE arrays are empty")]
    EmptySparse,

    #[error("Sparse PAE index {index} is out of range for a {size}x{size} matrix")]
    SparseIndexOutOfRange { index: usize, size: usize },

    #[error("PAE document has neither a 'predicted_aligned_error' nor a 'pae' field")]
    MissingField,

    #[error("PAE matrix is ragged: row {row} has {len} entries, expected {expected}")]
    RaggedMatrix {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("PAE matrix is not two-dimensional")]
    NotTwoDimensional,

    #[error("PAE entry at row {row}, column {col} is not a number")]
    NonNumericEntry { row: usize, col: usize },
}

/// A normalized matrix violates a structural invariant.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("PAE matrix is not square: {rows} rows, {cols} columns")]
    NotSquare { rows: usize, cols: usize },

    #[error("PAE matrix contains a negative value at row {row}, column {col}")]
    NegativeValue { row: usize, col: usize },

    #[error("PAE matrix contains a non-finite value at row {row}, column {col}")]
    NonFiniteValue { row: usize, col: usize },
}

/// Remote fetch or upload read failed before the matrix stage was reached.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("No PAE/structure data found for accession '{0}'")]
    NotFound(String),

    #[error("Timed out fetching '{url}'")]
    Timeout { url: String },

    #[error("Could not fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    #[error("Remote server returned status {status} for '{url}'")]
    Status { url: String, status: u16 },

    #[error("Structure file is not valid UTF-8")]
    StructureNotUtf8,
}

/// Opaque failure reported by the external clustering routine.
#[derive(Debug, Error)]
#[error("Clustering failed: {0}")]
pub struct ClusteringError(pub String);

/// Plot generation or artifact-file write failed.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Could not encode PAE plot: {0}")]
    Encode(String),

    #[error("Could not write plot artifact '{path}': {message}")]
    Write { path: String, message: String },
}

/// Umbrella over every stage failure; recovered at the pipeline boundary
/// and converted to a structured `{error: message}` payload.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Clustering(#[from] ClusteringError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PipelineError {
    /// 400 for invalid input, 500 for processing failures.
    pub fn http_status(&self) -> u16 {
        match self {
            PipelineError::Normalization(_) | PipelineError::Validation(_) => 400,
            PipelineError::Acquisition(_)
            | PipelineError::Clustering(_)
            | PipelineError::Render(_) => 500,
        }
    }
}
