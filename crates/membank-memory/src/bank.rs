//! Read access to the memory bank directory.
//!
//! Layout: `core/*.md` for the fixed context files, `learning/` and `cache/`
//! for JSON documents, any other `*.md` anywhere below the root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A markdown file loaded from the memory bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Path relative to the memory bank root, `/`-separated.
    pub name: String,
    pub content: String,
}

/// The memory bank rooted at a directory.
#[derive(Debug, Clone)]
pub struct MemoryBank {
    root: PathBuf,
    core_files: Vec<String>,
}

impl MemoryBank {
    pub fn new(root: impl Into<PathBuf>, core_files: Vec<String>) -> Self {
        Self {
            root: root.into(),
            core_files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn core_dir(&self) -> PathBuf {
        self.root.join("core")
    }

    /// Read every configured core file that exists. Missing files are skipped
    /// silently, unreadable ones with a warning.
    pub fn load_core_documents(&self) -> Vec<MemoryDocument> {
        let core = self.core_dir();
        let mut docs = Vec::new();
        for file in &self.core_files {
            let path = core.join(file);
            match std::fs::read_to_string(&path) {
                Ok(content) => docs.push(MemoryDocument {
                    name: format!("core/{file}"),
                    content,
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Core file not present");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read core file");
                }
            }
        }
        docs
    }

    /// Every `*.md` file below the root except under `cache/`, sorted by name.
    pub fn load_all_documents(&self) -> Vec<MemoryDocument> {
        let mut docs = Vec::new();
        let cache_dir = self.root.join("cache");
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.path() != cache_dir)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable memory bank entry");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(content) => docs.push(MemoryDocument {
                    name: self.relative_name(entry.path()),
                    content,
                }),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to read memory file")
                }
            }
        }
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }

    fn relative_name(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Short fingerprint of a document set. Changes whenever any name or
    /// content changes, so cached search results built on an older corpus miss.
    pub fn revision(docs: &[MemoryDocument]) -> String {
        let mut hasher = Sha256::new();
        for doc in docs {
            hasher.update(doc.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(doc.content.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(&hasher.finalize()[..8])
    }
}
