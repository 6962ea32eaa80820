//! File-based persistence for extraction results.
//!
//! Entries live in ~/.cache/treescope/extractions/ (or a configured
//! directory) as one JSON file per (fingerprint, parameters). Each file
//! records the fingerprint it was computed from and is discarded when that no
//! longer matches. I/O failures are logged and otherwise ignored.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CacheKey;
use crate::extract::Extraction;
use crate::source::Fingerprint;

#[derive(Debug, Serialize, Deserialize)]
struct StoredExtraction {
    fingerprint: Fingerprint,
    params: String,
    /// Unix timestamp in seconds
    created_at: u64,
    extraction: Extraction,
}

/// Persistent store for extractions.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open the cache in `dir`, or the platform cache directory when `None`.
    /// Returns `None` when no directory can be created.
    pub fn open(dir: Option<&Path>) -> Option<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => ProjectDirs::from("", "", "treescope")?
                .cache_dir()
                .join("extractions"),
        };
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "disk cache disabled");
            return None;
        }
        Some(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load an extraction for `key`, checking it against `current`.
    ///
    /// Files that fail to parse or were computed from other content are
    /// deleted.
    pub fn load(&self, key: &CacheKey, current: Fingerprint) -> Option<Extraction> {
        let path = self.file_path(key);
        let content = fs::read_to_string(&path).ok()?;
        let stored: StoredExtraction = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                self.remove(&path);
                return None;
            }
        };
        if stored.fingerprint != current || stored.params != key.params() {
            tracing::debug!(path = %path.display(), "discarding stale cache file");
            self.remove(&path);
            return None;
        }
        tracing::debug!(path = %path.display(), "disk cache hit");
        Some(stored.extraction)
    }

    /// Persist an extraction. The file is written under a temporary name in
    /// the same directory and renamed into place, so readers never see a
    /// partial entry.
    pub fn store(&self, key: &CacheKey, extraction: &Extraction) {
        let path = self.file_path(key);
        let stored = StoredExtraction {
            fingerprint: key.fingerprint(),
            params: key.params().to_string(),
            created_at: current_timestamp(),
            extraction: extraction.clone(),
        };
        if let Err(e) = self.write_atomic(&path, &stored) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write cache file");
        }
    }

    fn write_atomic(&self, path: &Path, stored: &StoredExtraction) -> Result<(), String> {
        let json = serde_json::to_vec(stored).map_err(|e| e.to_string())?;
        // Dropped without persisting on any error, which removes it
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| e.to_string())?;
        tmp.write_all(&json).map_err(|e| e.to_string())?;
        tmp.persist(path).map_err(|e| e.error.to_string())?;
        Ok(())
    }

    /// Delete every file stored for `fingerprint`. Returns how many went.
    pub fn purge(&self, fingerprint: Fingerprint) -> usize {
        let prefix = format!("{}-", fingerprint.to_hex());
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// `<fingerprint>-<operation>-<params digest>.json`
    fn file_path(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.params().as_bytes());
        let short: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        let operation = key.operation().replace(['/', '\\', ':'], "_");
        self.dir
            .join(format!("{}-{}-{}.json", key.fingerprint().to_hex(), operation, short))
    }

    fn remove(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            tracing::debug!(path = %path.display(), error = %e, "failed to delete cache file");
        }
    }
}

/// Get current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
