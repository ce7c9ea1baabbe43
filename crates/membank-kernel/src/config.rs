//! Configuration loading and workspace root discovery.
//!
//! Lookup order: an explicit `--config` path, `<root>/membank.toml`,
//! `~/.membank/config.toml`, then built-in defaults. A file that exists but
//! cannot be read or parsed is logged and skipped, never fatal.

use membank_types::config::MembankConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the per-workspace config file.
pub const CONFIG_FILE: &str = "membank.toml";

/// Entries whose presence marks a workspace root.
const ROOT_MARKERS: [&str; 3] = [CONFIG_FILE, ".taskmaster", "memory"];

/// Directories that hold helper scripts rather than the workspace itself.
const SCRIPT_DIRS: [&str; 2] = ["scripts", "tools"];

/// Load configuration for the workspace at `root`.
pub fn load_config(explicit: Option<&Path>, root: &Path) -> MembankConfig {
    if let Some(path) = explicit {
        return read_config(path).unwrap_or_default();
    }
    let candidates = [root.join(CONFIG_FILE), default_config_path()];
    for path in candidates.iter().filter(|p| p.exists()) {
        if let Some(config) = read_config(path) {
            return config;
        }
    }
    info!(root = %root.display(), "No config file found, using defaults");
    MembankConfig::default()
}

/// Parse one config file. `None` (with a warning) if it is missing or invalid.
fn read_config(path: &Path) -> Option<MembankConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Failed to read config file, using defaults"
            );
            return None;
        }
    };
    match toml::from_str::<MembankConfig>(&contents) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            Some(config)
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Failed to parse config, using defaults"
            );
            None
        }
    }
}

/// Find the workspace root for `start`.
///
/// Walks upward to the first directory holding `membank.toml`, `.taskmaster/`
/// or `memory/`. Starting inside `scripts/` or `tools/` begins the walk at the
/// parent. Falls back to `start` when nothing matches.
pub fn locate_root(start: &Path) -> PathBuf {
    let begin = match start.file_name().and_then(|n| n.to_str()) {
        Some(name) if SCRIPT_DIRS.contains(&name) => start.parent().unwrap_or(start),
        _ => start,
    };
    begin
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
        .unwrap_or_else(|| start.to_path_buf())
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    membank_home().join("config.toml")
}

/// Get the per-user membank directory.
pub fn membank_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".membank")
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_types::config::StorageBackend;

    #[test]
    fn test_load_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(Path::new("/nonexistent/membank.toml")), dir.path());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_workspace_config_is_partial() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "log_level = \"debug\"\nstorage = \"sqlite\"\n\n[cache]\nttl_secs = 60\n",
        )
        .unwrap();
        let config = load_config(None, dir.path());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.memory_capacity, 100);
        assert_eq!(config.search.top_k, 10);
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "log_level = [unterminated").unwrap();
        let config = load_config(Some(&path), dir.path());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_locate_root_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("memory")).unwrap();
        let nested = dir.path().join("src/deep/er");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(locate_root(&nested), dir.path());
    }

    #[test]
    fn test_locate_root_from_scripts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        // A marker inside scripts/ itself is ignored.
        std::fs::create_dir_all(scripts.join("memory")).unwrap();
        std::fs::create_dir_all(dir.path().join(".taskmaster")).unwrap();
        assert_eq!(locate_root(&scripts), dir.path());
    }

    #[test]
    fn test_locate_root_falls_back_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let start = dir.path().join("plain");
        std::fs::create_dir_all(&start).unwrap();
        // Nothing in the temp tree marks a root; ancestors above it may, so
        // only assert that the result is start or one of its ancestors.
        let root = locate_root(&start);
        assert!(start.starts_with(&root));
    }
}
