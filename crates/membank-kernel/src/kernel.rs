//! The `Membank` context: one value that owns every service for a workspace.

use crate::config::{load_config, locate_root};
use crate::error::{KernelError, KernelResult};
use membank_memory::bank::MemoryBank;
use membank_memory::cache::ResultCache;
use membank_memory::patterns::PatternRepository;
use membank_memory::{
    result_caches, ConsolidationEngine, Consultant, DocumentStore, JsonDirStore, SqliteStore,
};
use membank_tracker::{
    FeedbackTracker, ImprovementCycle, JsonTaskStorage, PerformanceMonitor, TaskService,
};
use membank_types::config::{MembankConfig, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Jaccard similarity at or above which consolidation merges two patterns.
const MERGE_THRESHOLD: f64 = 0.8;

/// SQLite database file inside the memory directory.
const SQLITE_FILE: &str = "membank.db";

/// Every service of one workspace, wired from a [`MembankConfig`].
pub struct Membank {
    config: MembankConfig,
    root: PathBuf,
    store: Arc<dyn DocumentStore>,
    consultant: Consultant,
    tasks: TaskService,
    feedback: FeedbackTracker,
    monitor: PerformanceMonitor,
    improvement: ImprovementCycle,
}

impl Membank {
    /// Resolve the workspace root and its configuration.
    ///
    /// An explicit `root` wins; otherwise the root is located from the current
    /// directory and may be overridden by the config's own `root` field.
    pub fn resolve(
        config_path: Option<&Path>,
        root: Option<&Path>,
    ) -> KernelResult<(MembankConfig, PathBuf)> {
        let located = match root {
            Some(root) => root.to_path_buf(),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| KernelError::BootFailed(format!("current directory: {e}")))?;
                locate_root(&cwd)
            }
        };
        let config = load_config(config_path, &located);
        let root = match (root, &config.root) {
            (None, Some(configured)) => located.join(configured),
            _ => located,
        };
        Ok((config, root))
    }

    /// [`resolve`](Self::resolve), then [`boot`](Self::boot).
    pub fn open(config_path: Option<&Path>, root: Option<&Path>) -> KernelResult<Self> {
        let (config, root) = Self::resolve(config_path, root)?;
        Self::boot(config, &root)
    }

    /// Build every service under `root`.
    pub fn boot(config: MembankConfig, root: &Path) -> KernelResult<Self> {
        if !root.is_dir() {
            return Err(KernelError::BootFailed(format!(
                "workspace root {} is not a directory",
                root.display()
            )));
        }
        let memory_dir = root.join(&config.memory.dir);
        let store: Arc<dyn DocumentStore> = match config.storage {
            StorageBackend::Files => Arc::new(JsonDirStore::new(&memory_dir)),
            StorageBackend::Sqlite => Arc::new(SqliteStore::open(&memory_dir.join(SQLITE_FILE))?),
        };

        let bank = MemoryBank::new(&memory_dir, config.memory.core_files.clone());
        let consultant = Consultant::new(
            bank,
            store.clone(),
            &config.memory,
            &config.search,
            &config.cache,
        );
        let tasks = TaskService::new(JsonTaskStorage::new(root.join(&config.tasks.file)));
        let feedback = FeedbackTracker::new(root.join(&config.feedback.dir), config.feedback.max_entries);
        let monitor = PerformanceMonitor::new(&root.join(&config.monitoring.dir), &config.monitoring);
        let improvement = ImprovementCycle::new(
            &root.join(&config.improvement.dir),
            &config.improvement,
            &config.monitoring,
            feedback.clone(),
            monitor.clone(),
        );

        info!(
            root = %root.display(),
            storage = ?config.storage,
            "Membank booted"
        );
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store,
            consultant,
            tasks,
            feedback,
            monitor,
            improvement,
        })
    }

    pub fn config(&self) -> &MembankConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn consultant(&self) -> &Consultant {
        &self.consultant
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn feedback(&self) -> &FeedbackTracker {
        &self.feedback
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn improvement(&self) -> &ImprovementCycle {
        &self.improvement
    }

    /// Handles on the consultation result caches.
    pub fn caches(&self) -> Vec<ResultCache> {
        result_caches(&self.store, Duration::from_secs(self.config.cache.ttl_secs))
    }

    pub fn consolidation_engine(&self) -> ConsolidationEngine {
        ConsolidationEngine::new(
            PatternRepository::new(self.store.clone(), &self.config.memory.pattern_library),
            self.caches(),
            MERGE_THRESHOLD,
        )
    }
}
