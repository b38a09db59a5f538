//! Cache store for persisting raw API responses to disk
//!
//! Provides a `CacheStore` that keeps one JSON file per `CacheKey`, holding
//! the response text together with the fingerprint it was stored under and
//! the time it was fetched.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::CacheKey;
use crate::fs_util::write_atomic;

/// Errors that can occur when writing to the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Creating the directory or writing the file failed
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The entry could not be serialized
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Fingerprint of the request, checked on read
    fingerprint: String,
    /// When the response was fetched
    cached_at: DateTime<Utc>,
    /// The raw response text
    payload: String,
}

/// Result of a cache hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    /// The response text exactly as it was stored
    pub payload: String,
    /// When the response was originally fetched
    pub cached_at: DateTime<Utc>,
}

/// Reads and writes cached responses in a single directory
///
/// The default location is the platform cache directory
/// (`~/.cache/epi_downloader/` on Linux). Entries have no expiry; a failed or
/// corrupt read is reported as a miss so the caller falls back to the network.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Creates a new CacheStore using the platform cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "epi_downloader")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheStore with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.file_name())
    }

    /// Looks up the payload stored under `key`
    ///
    /// Returns `None` if there is no entry, or if the entry cannot be read,
    /// cannot be parsed, or was stored under a different fingerprint. Anything
    /// other than a plain miss is logged.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedPayload> {
        let path = self.path_for(key);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.fingerprint != key.fingerprint() {
            warn!(
                "Ignoring cache entry {}: stored for {} but looked up for {}",
                path.display(),
                entry.fingerprint,
                key
            );
            return None;
        }

        debug!("Cache hit for {}", key);
        Some(CachedPayload {
            payload: entry.payload,
            cached_at: entry.cached_at,
        })
    }

    /// Stores `payload` under `key`, replacing any existing entry
    ///
    /// The entry is written to a temporary file and renamed into place, so a
    /// concurrent or interrupted run never sees a partial entry.
    pub fn store(&self, key: &CacheKey, payload: &str) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;

        let entry = CacheEntry {
            fingerprint: key.fingerprint().to_string(),
            cached_at: Utc::now(),
            payload: payload.to_string(),
        };
        let json = serde_json::to_vec(&entry)?;

        write_atomic(&self.path_for(key), &json)?;
        debug!("Cached {} ({} bytes)", key, payload.len());
        Ok(())
    }
}
