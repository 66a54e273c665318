use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::afdb::DEFAULT_AFDB_BASE_URL;
use crate::cache::ArtifactCache;

pub const DEFAULT_CACHE_DIR: &str = "static/plots";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration, loadable from a JSON file. Every field has a
/// default so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding rendered plot artifacts.
    pub cache_dir: String,
    /// Artifact retention window, measured from last-modified time.
    pub retention_hours: u64,
    /// Base URL of the prediction metadata API.
    pub afdb_base_url: String,
    /// Timeout applied to every remote fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            retention_hours: ArtifactCache::DEFAULT_RETENTION_HOURS,
            afdb_base_url: DEFAULT_AFDB_BASE_URL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read settings file '{path}': {e}"))?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Could not parse settings file '{path}': {e}"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn artifact_cache(&self) -> ArtifactCache {
        ArtifactCache::new(self.cache_dir.clone(), self.retention_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.cache_dir, "static/plots");
        assert_eq!(s.retention_hours, 24);
        assert_eq!(s.fetch_timeout_secs, 30);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"retention_hours": 48}}"#).unwrap();

        let s = Settings::load_from_path(path.to_str().unwrap()).unwrap();
        assert_eq!(s.retention_hours, 48);
        assert_eq!(s.cache_dir, "static/plots");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Settings::load_from_path("/no/such/settings.json").is_err());
    }
}
