//! Task CRUD over a single JSON file.
//!
//! Every operation re-reads the whole file; mutating operations rewrite it.
//! Operations that turn out to be no-ops (unknown id) do not write.

use crate::json_log::{read_json, write_json};
use membank_types::error::{MembankError, MembankResult};
use membank_types::task::{NewTask, Task, TaskPatch, TaskStatus};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where tasks are persisted.
pub trait TaskStorage: Send + Sync {
    fn load(&self) -> MembankResult<Vec<Task>>;
    fn save(&self, tasks: &[Task]) -> MembankResult<()>;
}

/// Accepted on-disk shapes: a bare array or `{ "tasks": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TaskFile {
    List(Vec<Task>),
    Wrapped { tasks: Vec<Task> },
}

/// `tasks.json` storage. A missing file is an empty task list; a corrupt file
/// is an error so it never gets overwritten by an empty list.
#[derive(Debug, Clone)]
pub struct JsonTaskStorage {
    path: PathBuf,
}

impl JsonTaskStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskStorage for JsonTaskStorage {
    fn load(&self) -> MembankResult<Vec<Task>> {
        match read_json::<TaskFile>(&self.path)? {
            Some(TaskFile::List(tasks)) | Some(TaskFile::Wrapped { tasks }) => Ok(tasks),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, tasks: &[Task]) -> MembankResult<()> {
        write_json(&self.path, tasks)?;
        debug!(path = %self.path.display(), count = tasks.len(), "Tasks written");
        Ok(())
    }
}

/// Task operations over a [`TaskStorage`].
pub struct TaskService<S: TaskStorage = JsonTaskStorage> {
    storage: S,
}

impl<S: TaskStorage> TaskService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Append a task with id `max(existing) + 1`, or 1 for an empty list.
    pub fn create_task(&self, new: NewTask) -> MembankResult<Task> {
        if new.title.trim().is_empty() {
            return Err(MembankError::InvalidInput(
                "task title must not be empty".to_string(),
            ));
        }
        let mut tasks = self.storage.load()?;
        if let Some(missing) = new
            .dependencies
            .iter()
            .find(|dep| !tasks.iter().any(|t| t.id == **dep))
        {
            return Err(MembankError::InvalidInput(format!(
                "dependency {missing} does not exist"
            )));
        }

        let id = tasks.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
        let task = Task {
            id,
            title: new.title,
            description: new.description,
            status: new.status.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            dependencies: new.dependencies,
            details: new.details,
            test_strategy: new.test_strategy,
        };
        tasks.push(task.clone());
        self.storage.save(&tasks)?;
        info!(id, title = %task.title, "Task created");
        Ok(task)
    }

    pub fn get_task(&self, id: u64) -> MembankResult<Option<Task>> {
        Ok(self.storage.load()?.into_iter().find(|t| t.id == id))
    }

    pub fn get_all_tasks(&self) -> MembankResult<Vec<Task>> {
        self.storage.load()
    }

    /// Shallow-merge `patch` into the task. `None` (and no write) for an unknown id.
    pub fn update_task(&self, id: u64, patch: TaskPatch) -> MembankResult<Option<Task>> {
        if matches!(&patch.title, Some(t) if t.trim().is_empty()) {
            return Err(MembankError::InvalidInput(
                "task title must not be empty".to_string(),
            ));
        }
        let mut tasks = self.storage.load()?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        patch.apply(task);
        let updated = task.clone();
        self.storage.save(&tasks)?;
        info!(id, status = %updated.status, "Task updated");
        Ok(Some(updated))
    }

    pub fn set_status(&self, id: u64, status: TaskStatus) -> MembankResult<Option<Task>> {
        self.update_task(
            id,
            TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Remove the task. `false` (and no write) for an unknown id.
    pub fn delete_task(&self, id: u64) -> MembankResult<bool> {
        let tasks = self.storage.load()?;
        let before = tasks.len();
        let remaining: Vec<Task> = tasks.into_iter().filter(|t| t.id != id).collect();
        if remaining.len() == before {
            return Ok(false);
        }
        self.storage.save(&remaining)?;
        info!(id, "Task deleted");
        Ok(true)
    }

    /// The pending task to work on next: every dependency done, highest
    /// priority first, then lowest id.
    pub fn next_task(&self) -> MembankResult<Option<Task>> {
        let tasks = self.storage.load()?;
        let done = |id: &u64| {
            tasks
                .iter()
                .any(|t| t.id == *id && t.status == TaskStatus::Done)
        };
        Ok(tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && t.dependencies.iter().all(done))
            .min_by_key(|t| (t.priority.rank(), t.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_types::task::TaskPriority;
    use std::sync::Mutex;

    /// In-memory storage that counts writes.
    #[derive(Default)]
    struct MemoryStorage {
        tasks: Mutex<Vec<Task>>,
        saves: Mutex<Vec<Vec<Task>>>,
    }

    impl TaskStorage for MemoryStorage {
        fn load(&self) -> MembankResult<Vec<Task>> {
            Ok(self.tasks.lock().unwrap().clone())
        }

        fn save(&self, tasks: &[Task]) -> MembankResult<()> {
            *self.tasks.lock().unwrap() = tasks.to_vec();
            self.saves.lock().unwrap().push(tasks.to_vec());
            Ok(())
        }
    }

    fn service() -> TaskService<MemoryStorage> {
        TaskService::new(MemoryStorage::default())
    }

    fn save_count(service: &TaskService<MemoryStorage>) -> usize {
        service.storage().saves.lock().unwrap().len()
    }

    #[test]
    fn test_create_on_empty_store() {
        let service = service();
        let task = service.create_task(NewTask::new("Test Task", "desc")).unwrap();
        let expected = Task {
            id: 1,
            title: "Test Task".to_string(),
            description: "desc".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            dependencies: vec![],
            details: None,
            test_strategy: None,
        };
        assert_eq!(task, expected);
        let saves = service.storage().saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0], vec![expected]);
    }

    #[test]
    fn test_ids_follow_max() {
        let service = service();
        service.create_task(NewTask::new("a", "")).unwrap();
        service.create_task(NewTask::new("b", "")).unwrap();
        assert!(service.delete_task(1).unwrap());
        let c = service.create_task(NewTask::new("c", "")).unwrap();
        assert_eq!(c.id, 3);
        assert_eq!(service.get_task(3).unwrap().unwrap().title, "c");
    }

    #[test]
    fn test_update_missing_does_not_write() {
        let service = service();
        service.create_task(NewTask::new("a", "")).unwrap();
        let result = service
            .update_task(
                42,
                TaskPatch {
                    title: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(result.is_none());
        assert_eq!(save_count(&service), 1);
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let service = service();
        let original = service.create_task(NewTask::new("a", "keep me")).unwrap();
        let updated = service
            .update_task(
                original.id,
                TaskPatch {
                    priority: Some(TaskPriority::High),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        let mut expected = original.clone();
        expected.priority = TaskPriority::High;
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_delete_missing_does_not_write() {
        let service = service();
        assert!(!service.delete_task(7).unwrap());
        assert_eq!(save_count(&service), 0);
    }

    #[test]
    fn test_delete_existing() {
        let service = service();
        service.create_task(NewTask::new("a", "")).unwrap();
        assert!(service.delete_task(1).unwrap());
        assert!(service.get_all_tasks().unwrap().is_empty());
    }

    #[test]
    fn test_empty_title_rejected() {
        let service = service();
        assert!(matches!(
            service.create_task(NewTask::new("  ", "")),
            Err(MembankError::InvalidInput(_))
        ));
        assert_eq!(save_count(&service), 0);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let service = service();
        let mut new = NewTask::new("a", "");
        new.dependencies = vec![9];
        assert!(service.create_task(new).is_err());
    }

    #[test]
    fn test_next_task_respects_dependencies_and_priority() {
        let service = service();
        service.create_task(NewTask::new("setup", "")).unwrap();
        let mut blocked = NewTask::new("blocked", "");
        blocked.dependencies = vec![1];
        blocked.priority = Some(TaskPriority::High);
        service.create_task(blocked).unwrap();
        let mut low = NewTask::new("low", "");
        low.priority = Some(TaskPriority::Low);
        service.create_task(low).unwrap();

        assert_eq!(service.next_task().unwrap().unwrap().id, 1);
        service.set_status(1, TaskStatus::Done).unwrap();
        assert_eq!(service.next_task().unwrap().unwrap().id, 2);
    }

    #[test]
    fn test_json_storage_accepts_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, r#"{"tasks":[{"id":4,"title":"wrapped"}]}"#).unwrap();
        let service = TaskService::new(JsonTaskStorage::new(&path));
        let task = service.get_task(4).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        service.create_task(NewTask::new("next", "")).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.is_array());
        assert_eq!(raw[1]["id"], 5);
    }

    #[test]
    fn test_json_storage_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonTaskStorage::new(dir.path().join(".taskmaster/tasks/tasks.json"));
        assert!(storage.load().unwrap().is_empty());
        std::fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
        std::fs::write(storage.path(), "nope").unwrap();
        assert!(storage.load().is_err());
    }
}
