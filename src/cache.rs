use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use crate::cluster::ClusterParams;
use crate::error::RenderError;

/// Content-addressed store of rendered plot images.
///
/// Entries are named `<40-hex-sha1>.png`; anything else in the cache
/// directory is never touched. Entries older than the retention window
/// (by last-modified time) are swept before every lookup, best-effort:
/// sweep failures are logged and never fail the enclosing request.
pub struct ArtifactCache {
    root: PathBuf,
    retention: Duration,
    entry_pattern: Regex,
}

impl ArtifactCache {
    pub const DEFAULT_RETENTION_HOURS: u64 = 24;

    pub fn new(root: impl Into<PathBuf>, retention_hours: u64) -> Self {
        Self::with_retention(root, Duration::from_secs(retention_hours * 60 * 60))
    }

    pub fn with_retention(root: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            root: root.into(),
            retention,
            entry_pattern: Regex::new(r"^[0-9a-f]{40}\.png$").unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derives the cache key for one render: SHA-1 over the request's
    /// identity bytes (accession ID or raw uploaded PAE bytes) plus a
    /// canonical encoding of the clustering parameters, so a parameter
    /// change never reuses a stale artifact.
    pub fn cache_key(identity: &[u8], params: &ClusterParams) -> String {
        let mut hasher = Sha1::new();
        hasher.update(identity);
        hasher.update(params.canonical_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Returns the artifact path for `key`, rendering and storing it on a
    /// miss. Expired entries are swept first, so a stale file is never
    /// served as a hit.
    pub fn get_or_render<F>(&self, key: &str, render: F) -> Result<PathBuf, RenderError>
    where
        F: FnOnce() -> Result<Vec<u8>, RenderError>,
    {
        self.sweep_expired();

        let path = self.root.join(format!("{key}.png"));
        if path.exists() {
            debug!(key, "plot artifact cache hit");
            return Ok(path);
        }

        let bytes = render()?;
        fs::create_dir_all(&self.root).map_err(|e| RenderError::Write {
            path: self.root.display().to_string(),
            message: e.to_string(),
        })?;
        let tmp_path = self.root.join(format!("{key}.png.part"));
        fs::write(&tmp_path, &bytes).map_err(|e| RenderError::Write {
            path: tmp_path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| RenderError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(key, size = bytes.len(), "plot artifact rendered and cached");
        Ok(path)
    }

    /// Deletes digest-named entries older than the retention window.
    /// Best-effort: every failure is logged and swallowed. Returns the
    /// number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = SystemTime::now() - self.retention;
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if self.root.exists() {
                    warn!(root = %self.root.display(), error = %e, "could not scan artifact cache");
                }
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.entry_pattern.is_match(name) {
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified());
            match modified {
                Ok(modified) if modified < cutoff => {
                    match fs::remove_file(entry.path()) {
                        Ok(()) => {
                            info!(name, "removed expired plot artifact");
                            removed += 1;
                        }
                        Err(e) => {
                            warn!(name, error = %e, "could not remove expired plot artifact");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(name, error = %e, "could not read artifact modification time");
                }
            }
        }
        removed
    }
}
