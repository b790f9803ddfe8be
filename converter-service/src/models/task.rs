use crate::models::ConversionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub id: Uuid,
    pub kind: ConversionKind,
    pub status: TaskStatus,
    pub original_filename: String,
    /// Staged upload, `<upload_dir>/<id>.<ext>`.
    pub file_path: PathBuf,
    /// `<converted_dir>/<id>`, where the office suite writes its result.
    pub output_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub keep_local: bool,
    pub converted_file: Option<PathBuf>,
    pub error: Option<String>,
    pub object_key: Option<String>,
    pub bucket: Option<String>,
    pub local_files_removed: bool,
}

impl ConversionTask {
    pub fn new(
        id: Uuid,
        kind: ConversionKind,
        original_filename: String,
        file_path: PathBuf,
        output_dir: PathBuf,
        keep_local: bool,
    ) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Processing,
            original_filename,
            file_path,
            output_dir,
            created_at: Utc::now(),
            keep_local,
            converted_file: None,
            error: None,
            object_key: None,
            bucket: None,
            local_files_removed: false,
        }
    }

    /// Marks the task completed. Returns false if it had already finished.
    pub fn complete(&mut self, converted_file: PathBuf) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.converted_file = Some(converted_file);
        true
    }

    /// Marks the task failed. Returns false if it had already finished.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        true
    }

    pub fn record_upload(&mut self, bucket: impl Into<String>, object_key: impl Into<String>) {
        debug_assert_eq!(self.status, TaskStatus::Completed);
        self.bucket = Some(bucket.into());
        self.object_key = Some(object_key.into());
    }

    /// Original name with the converted file's extension, e.g. `report.doc` -> `report.docx`.
    pub fn download_filename(&self) -> String {
        let stem = Path::new(&self.original_filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("converted");

        let extension = self
            .converted_file
            .as_deref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .unwrap_or_else(|| self.kind.target_format());

        format!("{}.{}", stem, extension)
    }

    /// Object key used when the result is staged in object storage.
    pub fn object_key_for_upload(&self) -> String {
        format!("{}/{}", self.id, self.download_filename())
    }

    /// Completed, uploaded, still holding local files and older than `ttl`.
    pub fn local_files_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        if self.status != TaskStatus::Completed
            || self.object_key.is_none()
            || self.keep_local
            || self.local_files_removed
        {
            return false;
        }

        now.signed_duration_since(self.created_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }
}

/// Strips any client-side directory components from an uploaded filename.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
