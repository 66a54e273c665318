use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::afdb::{StructureDatabase, normalize_accession};
use crate::cache::ArtifactCache;
use crate::cluster::{ClusterInterval, ClusterParams, FragmentClusterer};
use crate::error::{AcquisitionError, PipelineError};
use crate::matrix;
use crate::plot::render_pae_plot;
use crate::structure_format::detect_structure_format;

/// Request input, already form-validated by the web layer. Only the two
/// known input types exist; anything else never reaches the pipeline.
#[derive(Debug, Clone)]
pub enum IngestionInput {
    /// Fetch PAE and structure from the remote database by accession ID.
    Afdb { accession: String },
    /// Uploaded PAE JSON, with an optional structure file alongside.
    Upload {
        pae_json: Vec<u8>,
        structure: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub input: IngestionInput,
    pub params: ClusterParams,
}

/// Payload of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionData {
    pub cluster_intervals: Vec<ClusterInterval>,
    pub structure: String,
    pub structure_format: Option<String>,
    pub pae_plot_path: String,
}

/// Outcome of one pipeline run; produced once per request, never persisted.
#[derive(Debug)]
pub enum IngestionResult {
    Success(IngestionData),
    Failure { error: String, status: u16 },
}

impl IngestionResult {
    pub fn http_status(&self) -> u16 {
        match self {
            IngestionResult::Success(_) => 200,
            IngestionResult::Failure { status, .. } => *status,
        }
    }

    /// Wire envelope: `{"success": true, "data": {...}}` on success,
    /// `{"error": "..."}` on failure.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            IngestionResult::Success(data) => json!({"success": true, "data": data}),
            IngestionResult::Failure { error, .. } => json!({"error": error}),
        }
    }
}

/// Linear pipeline: acquire, normalize and validate, cluster, render
/// through the artifact cache, assemble. Every stage failure is terminal
/// for the request and surfaces as a structured error payload; nothing is
/// retried and no partial result is produced.
pub struct IngestionPipeline<'a> {
    database: &'a dyn StructureDatabase,
    clusterer: &'a dyn FragmentClusterer,
    cache: ArtifactCache,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        database: &'a dyn StructureDatabase,
        clusterer: &'a dyn FragmentClusterer,
        cache: ArtifactCache,
    ) -> Self {
        Self {
            database,
            clusterer,
            cache,
        }
    }

    pub fn run(&self, request: &IngestionRequest) -> IngestionResult {
        match self.execute(request) {
            Ok(data) => IngestionResult::Success(data),
            Err(e) => {
                info!(error = %e, status = e.http_status(), "ingestion failed");
                IngestionResult::Failure {
                    error: e.to_string(),
                    status: e.http_status(),
                }
            }
        }
    }

    fn execute(&self, request: &IngestionRequest) -> Result<IngestionData, PipelineError> {
        // Acquire. The identity bytes that later key the artifact cache are
        // fixed here: the normalized accession, or the raw uploaded bytes.
        let (identity, pae_bytes, structure) = match &request.input {
            IngestionInput::Afdb { accession } => {
                let accession = normalize_accession(accession);
                let data = self.database.fetch(&accession)?;
                debug!(%accession, pae_len = data.pae_json.len(), "fetched prediction data");
                (accession.into_bytes(), data.pae_json, Some(data.structure))
            }
            IngestionInput::Upload {
                pae_json,
                structure,
            } => {
                let structure = structure
                    .as_ref()
                    .map(|bytes| {
                        String::from_utf8(bytes.clone())
                            .map_err(|_| AcquisitionError::StructureNotUtf8)
                    })
                    .transpose()?;
                (pae_json.clone(), pae_json.clone(), structure)
            }
        };

        // Normalize and validate; clustering never sees an invalid matrix.
        let matrix = matrix::normalize(&pae_bytes)?;
        matrix::validate(&matrix)?;
        debug!(residues = matrix.n_residues(), "matrix normalized");

        let clustering = self.clusterer.cluster(&matrix, &request.params)?;
        debug!(fragments = clustering.intervals.len(), "clustering complete");

        let key = ArtifactCache::cache_key(&identity, &request.params);
        let plot_path = self
            .cache
            .get_or_render(&key, || render_pae_plot(&matrix, &clustering.intervals))?;

        // A missing structure is not a failure: the format is simply null.
        let structure = structure.unwrap_or_default();
        let structure_format = if structure.is_empty() {
            None
        } else {
            detect_structure_format(&structure).map(|f| f.label().to_string())
        };

        Ok(IngestionData {
            cluster_intervals: clustering.intervals,
            structure,
            structure_format,
            pae_plot_path: plot_path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::afdb::PredictionData;
    use crate::cluster::Clustering;
    use crate::error::ClusteringError;
    use crate::matrix::PaeMatrix;
    use std::cell::Cell;

    struct StubDatabase {
        pae_json: Vec<u8>,
        structure: String,
    }

    impl StructureDatabase for StubDatabase {
        fn fetch(&self, accession: &str) -> Result<PredictionData, AcquisitionError> {
            if accession == "MISSING" {
                return Err(AcquisitionError::NotFound(accession.to_string()));
            }
            Ok(PredictionData {
                pae_json: self.pae_json.clone(),
                structure: self.structure.clone(),
            })
        }
    }

    struct StubClusterer {
        calls: Cell<usize>,
    }

    impl StubClusterer {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl FragmentClusterer for StubClusterer {
        fn cluster(
            &self,
            matrix: &PaeMatrix,
            _params: &ClusterParams,
        ) -> Result<Clustering, ClusteringError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Clustering {
                intervals: vec![ClusterInterval(0, matrix.n_residues() - 1)],
            })
        }
    }

    struct FailingClusterer;

    impl FragmentClusterer for FailingClusterer {
        fn cluster(
            &self,
            _matrix: &PaeMatrix,
            _params: &ClusterParams,
        ) -> Result<Clustering, ClusteringError> {
            Err(ClusteringError("graph is disconnected".to_string()))
        }
    }

    fn pae_json() -> Vec<u8> {
        br#"{"pae": [[0, 10, 30], [10, 0, 10], [30, 10, 0]]}"#.to_vec()
    }

    fn upload_request(structure: Option<Vec<u8>>) -> IngestionRequest {
        IngestionRequest {
            input: IngestionInput::Upload {
                pae_json: pae_json(),
                structure,
            },
            params: ClusterParams::default(),
        }
    }

    #[test]
    fn upload_path_succeeds_without_structure() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: vec![],
            structure: String::new(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let result = pipeline.run(&upload_request(None));
        assert_eq!(result.http_status(), 200);
        let json = result.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["structure"], "");
        assert_eq!(json["data"]["structure_format"], serde_json::Value::Null);
        assert_eq!(json["data"]["cluster_intervals"], json!([[0, 2]]));

        let plot_path = json["data"]["pae_plot_path"].as_str().unwrap();
        assert!(std::path::Path::new(plot_path).exists());
        assert!(plot_path.ends_with(".png"));
    }

    #[test]
    fn upload_path_sniffs_structure_format() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: vec![],
            structure: String::new(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let structure = b"HEADER    TEST STRUCTURE\nATOM      1  N   MET A   1\n".to_vec();
        let result = pipeline.run(&upload_request(Some(structure)));
        let json = result.to_json();
        assert_eq!(json["data"]["structure_format"], "pdb");
        assert!(json["data"]["structure"].as_str().unwrap().starts_with("HEADER"));
    }

    #[test]
    fn afdb_path_keys_the_cache_by_accession() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: pae_json(),
            structure: "data_TEST\n".to_string(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let request = IngestionRequest {
            input: IngestionInput::Afdb {
                accession: " p12345 ".to_string(),
            },
            params: ClusterParams::default(),
        };
        let result = pipeline.run(&request);
        let json = result.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["structure_format"], "cif");

        let expected = ArtifactCache::cache_key(b"P12345", &ClusterParams::default());
        assert!(dir.path().join(format!("{expected}.png")).exists());
    }

    #[test]
    fn unknown_accession_is_a_terminal_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: pae_json(),
            structure: String::new(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let request = IngestionRequest {
            input: IngestionInput::Afdb {
                accession: "missing".to_string(),
            },
            params: ClusterParams::default(),
        };
        let result = pipeline.run(&request);
        assert_eq!(result.http_status(), 500);
        assert_eq!(
            result.to_json()["error"],
            "No PAE/structure data found for accession 'MISSING'"
        );
        assert_eq!(clusterer.calls.get(), 0);
    }

    #[test]
    fn invalid_matrix_never_reaches_clustering() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: vec![],
            structure: String::new(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let request = IngestionRequest {
            input: IngestionInput::Upload {
                pae_json: br#"{"pae": [[0, -1], [1, 0]]}"#.to_vec(),
                structure: None,
            },
            params: ClusterParams::default(),
        };
        let result = pipeline.run(&request);
        assert_eq!(result.http_status(), 400);
        assert!(result.to_json()["error"]
            .as_str()
            .unwrap()
            .contains("negative value"));
        assert_eq!(clusterer.calls.get(), 0);
    }

    #[test]
    fn clustering_failure_is_caught_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: vec![],
            structure: String::new(),
        };
        let pipeline = IngestionPipeline::new(
            &db,
            &FailingClusterer,
            ArtifactCache::new(dir.path(), 24),
        );

        let result = pipeline.run(&upload_request(None));
        assert_eq!(result.http_status(), 500);
        assert_eq!(
            result.to_json()["error"],
            "Clustering failed: graph is disconnected"
        );
        assert!(dir.path().read_dir().unwrap().next().is_none());
    }

    #[test]
    fn identical_upload_reuses_the_cached_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let db = StubDatabase {
            pae_json: vec![],
            structure: String::new(),
        };
        let clusterer = StubClusterer::new();
        let pipeline =
            IngestionPipeline::new(&db, &clusterer, ArtifactCache::new(dir.path(), 24));

        let first = pipeline.run(&upload_request(None));
        let second = pipeline.run(&upload_request(None));
        assert_eq!(
            first.to_json()["data"]["pae_plot_path"],
            second.to_json()["data"]["pae_plot_path"]
        );
        assert_eq!(dir.path().read_dir().unwrap().count(), 1);
    }
}
