//! Document repository interface and the JSON-directory backend.
//!
//! Everything this crate persists (result caches, pattern library, knowledge
//! graph) is a JSON document addressed by `(collection, key)`. Collections may
//! be nested with `/` (e.g. `cache/hybrid`).

use membank_types::error::{MembankError, MembankResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Narrow repository interface over a JSON document store.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document. `Ok(None)` when it does not exist.
    fn get(&self, collection: &str, key: &str) -> MembankResult<Option<serde_json::Value>>;

    /// Create or overwrite a document.
    fn put(&self, collection: &str, key: &str, value: &serde_json::Value) -> MembankResult<()>;

    /// All documents of a collection as `(key, value)`, sorted by key.
    fn list(&self, collection: &str) -> MembankResult<Vec<(String, serde_json::Value)>>;

    /// Remove a document. Returns whether it existed.
    fn delete(&self, collection: &str, key: &str) -> MembankResult<bool>;
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write `bytes` to `path` via a temporary sibling and a rename, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> MembankResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(MembankError::Io(e));
    }
    Ok(())
}

/// Stores each document as `<root>/<collection>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> MembankResult<PathBuf> {
        let mut dir = self.root.clone();
        for segment in collection.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(MembankError::InvalidInput(format!(
                    "collection may not contain '{segment}': {collection}"
                )));
            }
            dir.push(sanitize_segment(segment));
        }
        Ok(dir)
    }

    fn document_path(&self, collection: &str, key: &str) -> MembankResult<PathBuf> {
        Ok(self
            .collection_dir(collection)?
            .join(format!("{}.json", sanitize_segment(key))))
    }
}

impl DocumentStore for JsonDirStore {
    fn get(&self, collection: &str, key: &str) -> MembankResult<Option<serde_json::Value>> {
        let path = self.document_path(collection, key)?;
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MembankError::Io(e)),
        };
        let value = serde_json::from_str(&contents)?;
        Ok(Some(value))
    }

    fn put(&self, collection: &str, key: &str, value: &serde_json::Value) -> MembankResult<()> {
        let path = self.document_path(collection, key)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), "Wrote document");
        Ok(())
    }

    fn list(&self, collection: &str) -> MembankResult<Vec<(String, serde_json::Value)>> {
        let dir = self.collection_dir(collection)?;
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MembankError::Io(e)),
        };
        let mut docs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(MembankError::from)
                .and_then(|c| serde_json::from_str(&c).map_err(MembankError::from))
            {
                Ok(value) => docs.push((key, value)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs)
    }

    fn delete(&self, collection: &str, key: &str) -> MembankResult<bool> {
        let path = self.document_path(collection, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MembankError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (tempfile::TempDir, JsonDirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, store) = setup();
        store.put("cache/hybrid", "abc", &json!({"x": 1})).unwrap();
        assert_eq!(store.get("cache/hybrid", "abc").unwrap(), Some(json!({"x": 1})));
    }

    #[test]
    fn test_get_missing_is_none() {
        let (_dir, store) = setup();
        assert_eq!(store.get("learning", "nope").unwrap(), None);
    }

    #[test]
    fn test_document_layout_on_disk() {
        let (dir, store) = setup();
        store.put("cache/semantic", "k1", &json!([])).unwrap();
        assert!(dir.path().join("cache").join("semantic").join("k1.json").exists());
    }

    #[test]
    fn test_list_sorted_and_skips_garbage() {
        let (dir, store) = setup();
        store.put("c", "b", &json!(2)).unwrap();
        store.put("c", "a", &json!(1)).unwrap();
        fs::write(dir.path().join("c").join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("c").join("notes.txt"), "ignored").unwrap();
        let docs = store.list("c").unwrap();
        let keys: Vec<_> = docs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_delete() {
        let (_dir, store) = setup();
        store.put("c", "a", &json!(1)).unwrap();
        assert!(store.delete("c", "a").unwrap());
        assert!(!store.delete("c", "a").unwrap());
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let (_dir, store) = setup();
        assert!(store.put("../escape", "a", &json!(1)).is_err());
    }

    #[test]
    fn test_key_sanitized() {
        assert_eq!(sanitize_segment("a/b c.d"), "a_b_c_d");
        assert_eq!(sanitize_segment(""), "_");
    }
}
