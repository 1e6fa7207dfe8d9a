//! Key/value settings persistence.
//!
//! Keys are slash separated (`data_module/config`). [`FileSettingsStore`]
//! maps each key to a file below a root directory; [`MemorySettingsStore`]
//! keeps everything in a shared map and is what tests use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Error type for settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The key is empty or tries to leave the store root.
    #[error("invalid settings key: {0:?}")]
    InvalidKey(String),

    /// Underlying storage failed.
    #[error("settings I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Persistent key/value storage for small records.
pub trait SettingsStore: Send + Sync {
    /// Read the record stored under `key`, `None` if it was never written.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SettingsError>;

    /// Replace the record stored under `key`.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SettingsError>;
}

fn check_key(key: &str) -> Result<(), SettingsError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(SettingsError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ─── File backed ────────────────────────────────────────────────────

/// One file per key below `root`.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SettingsError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SettingsError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored record for {key}");
                Ok(None)
            }
            Err(source) => Err(SettingsError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SettingsError> {
        let path = self.path_for(key)?;
        let io_err = |source| SettingsError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write then rename so a crash never leaves a truncated record.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)?;
        debug!("Stored {} bytes under {key}", bytes.len());
        Ok(())
    }
}

// ─── In memory ──────────────────────────────────────────────────────

/// Shared in-memory store. Clones see the same records.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves, for tests asserting persistence happened.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, SettingsError> {
        check_key(key)?;
        Ok(self.records.lock().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), SettingsError> {
        check_key(key)?;
        self.records.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
