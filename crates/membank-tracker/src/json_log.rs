//! JSON file helpers shared by the trackers.

use membank_memory::store::write_atomic;
use membank_types::error::MembankResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and parse `path`. `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> MembankResult<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read `path`, degrading to `T::default()` on a missing or unreadable file.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!(path = %path.display(), "No data file yet");
            T::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable data file, using defaults");
            T::default()
        }
    }
}

/// Pretty-print `value` to `path` atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> MembankResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// A JSON array on disk that keeps only the newest `max` entries.
#[derive(Debug, Clone)]
pub struct CappedLog {
    path: PathBuf,
    max: usize,
}

impl CappedLog {
    pub fn new(path: impl Into<PathBuf>, max: usize) -> Self {
        Self {
            path: path.into(),
            max,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, oldest first. Missing or corrupt files read as empty.
    pub fn load<T: DeserializeOwned>(&self) -> Vec<T> {
        read_json_or_default(&self.path)
    }

    /// Rewrite the whole array, dropping the oldest entries beyond the cap.
    pub fn save<T: Serialize>(&self, entries: &[T]) -> MembankResult<()> {
        let start = entries.len().saturating_sub(self.max);
        write_json(&self.path, &entries[start..])
    }

    /// Append one entry and rewrite.
    pub fn append<T: Serialize + DeserializeOwned>(&self, entry: T) -> MembankResult<()> {
        let mut entries: Vec<T> = self.load();
        entries.push(entry);
        self.save(&entries)
    }
}
