use serde::{Deserialize, Serialize};

use crate::error::ClusteringError;
use crate::matrix::PaeMatrix;

/// One contiguous residue-index range identified as a structural fragment.
/// Serialized as a `[start, end]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInterval(pub usize, pub usize);

impl ClusterInterval {
    pub fn start(&self) -> usize {
        self.0
    }

    pub fn end(&self) -> usize {
        self.1
    }
}

/// Graph partitioning objective understood by the clustering routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveFunction {
    Modularity,
    Cpm,
}

impl ObjectiveFunction {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectiveFunction::Modularity => "modularity",
            ObjectiveFunction::Cpm => "cpm",
        }
    }
}

/// Parameters forwarded to the external clustering routine.
///
/// `merge` arrives from the input form but the routine never consumes it;
/// it is carried here so the wire contract round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    pub threshold: u32,
    pub resolution: f64,
    pub objective_function: ObjectiveFunction,
    pub iterations: i32,
    pub min_size: usize,
    #[serde(default)]
    pub merge: bool,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            threshold: 2,
            resolution: 0.7,
            objective_function: ObjectiveFunction::Modularity,
            iterations: -1,
            min_size: 10,
            merge: true,
        }
    }
}

impl ClusterParams {
    /// Stable text form folded into the artifact cache key, so artifacts
    /// rendered under different parameters never collide.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        format!(
            "threshold={};resolution={};objective={};iterations={};min_size={}",
            self.threshold,
            self.resolution,
            self.objective_function.label(),
            self.iterations,
            self.min_size
        )
        .into_bytes()
    }
}

/// Result of one clustering run; intervals arrive in ascending start order
/// and are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub intervals: Vec<ClusterInterval>,
}

/// Seam for the external fragment clustering routine. The algorithm itself
/// is a black box; its output is only inspected for an error.
pub trait FragmentClusterer {
    fn cluster(&self, matrix: &PaeMatrix, params: &ClusterParams)
    -> Result<Clustering, ClusteringError>;
}
