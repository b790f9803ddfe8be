use crate::models::{ConversionKind, ConversionTask, TaskStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConvertParams {
    /// Keep local copies after the result is staged in object storage.
    /// Defaults to the server's `KEEP_LOCAL_FILES` setting.
    pub keep_local: Option<bool>,
}

/// Multipart body accepted by `/convert`.
#[derive(ToSchema)]
pub struct ConvertUpload {
    /// A `.doc`, `.xls` or `.ppt` file.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConvertAccepted {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub kind: ConversionKind,
    #[schema(example = "report.doc")]
    pub original_filename: String,
    pub created_at: String,
    pub keep_local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub local_files_removed: bool,
}

impl From<ConversionTask> for TaskStatusResponse {
    fn from(task: ConversionTask) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            kind: task.kind,
            original_filename: task.original_filename,
            created_at: task.created_at.to_rfc3339(),
            keep_local: task.keep_local,
            converted_file: task
                .converted_file
                .map(|p| p.to_string_lossy().into_owned()),
            error: task.error,
            object_key: task.object_key,
            bucket: task.bucket,
            local_files_removed: task.local_files_removed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadLinkResponse {
    pub url: String,
    pub message: String,
    pub usage: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShareLinkResponse {
    pub url: String,
    #[schema(example = "24h")]
    pub expires: String,
    pub download_command: String,
    pub wget_command: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "file-converter")]
    pub service: String,
    pub version: String,
    pub minio_available: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Task not found")]
    pub error: String,
    pub details: Option<String>,
}
