use crate::models::ConversionTask;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-memory table of conversion tasks shared by handlers, workers and
/// housekeeping. Tasks live for the lifetime of the process.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<Uuid, ConversionTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: ConversionTask) {
        self.tasks.insert(task.id, task);
    }

    pub fn get(&self, id: &Uuid) -> Option<ConversionTask> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    /// Applies `f` to the task under its shard lock. `f` must not touch the registry.
    pub fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut ConversionTask) -> R) -> Option<R> {
        self.tasks.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    /// Ids of tasks whose local files are due for removal.
    pub fn expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<Uuid> {
        self.tasks
            .iter()
            .filter(|entry| entry.value().local_files_expired(now, ttl))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Whether `path` is the staged upload or output directory of a known task.
    pub fn owns_path(&self, path: &Path) -> bool {
        self.tasks
            .iter()
            .any(|entry| entry.value().file_path == path || entry.value().output_dir == path)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
