use crate::config::FileConfig;
use crate::services::TaskRegistry;
use chrono::Utc;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outcome of one housekeeping pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_tasks: usize,
    pub orphans: usize,
}

/// Removes a task's staged upload and output directory unless the task asked
/// to keep them. Returns whether anything was removed.
pub async fn cleanup_task_files(registry: &TaskRegistry, task_id: &Uuid) -> Result<bool, AppError> {
    let Some(task) = registry.get(task_id) else {
        return Ok(false);
    };
    if task.keep_local || task.local_files_removed {
        return Ok(false);
    }

    remove_local_files(&task.file_path, &task.output_dir).await?;
    registry.update(task_id, |t| t.local_files_removed = true);

    tracing::info!(task_id = %task_id, "Removed local task files");
    Ok(true)
}

/// Deletes the staged upload and output directory; missing entries are fine.
pub async fn remove_local_files(file_path: &Path, output_dir: &Path) -> Result<(), AppError> {
    ignore_missing(tokio::fs::remove_file(file_path).await)?;
    ignore_missing(tokio::fs::remove_dir_all(output_dir).await)?;
    Ok(())
}

fn ignore_missing(result: std::io::Result<()>) -> std::io::Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Periodically frees disk held by finished tasks and by files no task claims.
pub struct Housekeeper {
    registry: TaskRegistry,
    upload_dir: PathBuf,
    converted_dir: PathBuf,
    ttl: Duration,
    interval: Duration,
}

impl Housekeeper {
    pub fn new(registry: TaskRegistry, files: &FileConfig) -> Self {
        Self {
            registry,
            upload_dir: files.upload_dir.clone(),
            converted_dir: files.converted_dir.clone(),
            ttl: files.ttl,
            interval: files.cleanup_interval,
        }
    }

    /// Sweeps immediately, then every `interval` until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Background cleanup started"
        );

        loop {
            let report = self.sweep().await;
            if report != SweepReport::default() {
                tracing::info!(
                    expired_tasks = report.expired_tasks,
                    orphans = report.orphans,
                    "Cleaned up expired files"
                );
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Background cleanup stopped");
    }

    pub async fn sweep(&self) -> SweepReport {
        SweepReport {
            expired_tasks: self.clean_expired_tasks().await,
            orphans: self.remove_orphans(&self.upload_dir).await
                + self.remove_orphans(&self.converted_dir).await,
        }
    }

    async fn clean_expired_tasks(&self) -> usize {
        let mut cleaned = 0;
        for task_id in self.registry.expired(Utc::now(), self.ttl) {
            match cleanup_task_files(&self.registry, &task_id).await {
                Ok(true) => cleaned += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "Failed to clean task files")
                }
            }
        }
        cleaned
    }

    /// Removes entries of `dir` older than the TTL that belong to no known task,
    /// e.g. leftovers from before a restart.
    async fn remove_orphans(&self, dir: &Path) -> usize {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Failed to scan directory");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    break;
                }
            };

            let path = entry.path();
            if self.registry.owns_path(&path) {
                continue;
            }

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if !age.is_some_and(|age| age > self.ttl) {
                continue;
            }

            let result = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };

            match ignore_missing(result) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Removed orphaned file");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned file")
                }
            }
        }

        removed
    }
}
