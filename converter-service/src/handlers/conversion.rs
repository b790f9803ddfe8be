use crate::dtos::{
    ConvertAccepted, ConvertParams, DownloadLinkResponse, ShareLinkResponse, TaskStatusResponse,
};
use crate::models::task::sanitize_filename;
use crate::models::{ConversionKind, ConversionTask, TaskStatus};
use crate::services::SHARE_LINK_TTL;
use crate::startup::AppState;
use crate::workers::housekeeping::remove_local_files;
use crate::workers::ConversionJob;
use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use std::io::ErrorKind;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const UPLOAD_FIELD: &str = "file";
const SHARE_LINK_EXPIRY_LABEL: &str = "24h";

/// Upload a legacy Office document and queue its conversion
#[utoipa::path(
    post,
    path = "/convert",
    params(ConvertParams),
    request_body(content = crate::dtos::ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Conversion queued", body = ConvertAccepted),
        (status = 400, description = "Missing or unsupported file", body = crate::dtos::ErrorResponse),
        (status = 413, description = "Upload exceeds MAX_UPLOAD_BYTES", body = crate::dtos::ErrorResponse),
        (status = 503, description = "Conversion queue is full", body = crate::dtos::ErrorResponse)
    ),
    tag = "Conversion"
)]
pub async fn convert_file(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
    mut multipart: Multipart,
) -> Result<Json<ConvertAccepted>, AppError> {
    let field = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error("Failed to read multipart field", e))?
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("No file uploaded in field '{}'", UPLOAD_FIELD))
            })?;

        if field.name() == Some(UPLOAD_FIELD) {
            break field;
        }
    };

    let original_filename = field
        .file_name()
        .and_then(sanitize_filename)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Uploaded file has no name")))?;

    let kind = ConversionKind::from_filename(&original_filename).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unsupported file type. Upload one of: {}",
            ConversionKind::supported_extensions()
        ))
    })?;

    let data = field
        .bytes()
        .await
        .map_err(|e| multipart_error("Failed to read file bytes", e))?;

    let files = &state.config.files;
    let task_id = Uuid::new_v4();
    let file_path = files
        .upload_dir
        .join(format!("{}.{}", task_id, kind.source_extension()));
    let output_dir = files.converted_dir.join(task_id.to_string());

    tokio::fs::create_dir_all(&output_dir).await?;
    tokio::fs::write(&file_path, &data).await.map_err(|e| {
        tracing::error!(task_id = %task_id, path = %file_path.display(), error = %e, "Failed to stage upload");
        AppError::from(e)
    })?;

    let keep_local = params.keep_local.unwrap_or(files.keep_local);
    let task = ConversionTask::new(
        task_id,
        kind,
        original_filename,
        file_path.clone(),
        output_dir.clone(),
        keep_local,
    );

    tracing::info!(
        task_id = %task_id,
        filename = %task.original_filename,
        kind = %kind,
        size = data.len(),
        keep_local,
        "Conversion task created"
    );

    state.registry.insert(task);

    let job = ConversionJob {
        task_id,
        kind,
        input: file_path.clone(),
        output_dir: output_dir.clone(),
    };

    if let Err(e) = state.jobs.enqueue(job) {
        tracing::warn!(task_id = %task_id, error = %e, "Rejecting conversion task");
        state.registry.update(&task_id, |t| t.fail(e.to_string()));
        if let Err(cleanup) = remove_local_files(&file_path, &output_dir).await {
            tracing::error!(task_id = %task_id, error = %cleanup, "Failed to remove rejected upload");
        }
        return Err(e);
    }

    Ok(Json(ConvertAccepted {
        task_id,
        status: TaskStatus::Processing,
    }))
}

/// Get the state of a conversion task
#[utoipa::path(
    get,
    path = "/status/{task_id}",
    params(("task_id" = String, Path, description = "Task id returned by /convert")),
    responses(
        (status = 200, description = "Task state", body = TaskStatusResponse),
        (status = 404, description = "Unknown task", body = crate::dtos::ErrorResponse)
    ),
    tag = "Conversion"
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let task = find_task(&state, &task_id)?;
    Ok(Json(TaskStatusResponse::from(task)))
}

/// Download a converted file, or a link to it when staged in object storage
#[utoipa::path(
    get,
    path = "/download/{task_id}",
    params(("task_id" = String, Path, description = "Task id returned by /convert")),
    responses(
        (status = 200, description = "Converted file as an attachment, or a JSON link", body = DownloadLinkResponse),
        (status = 400, description = "Task not completed", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Unknown task or file no longer available", body = crate::dtos::ErrorResponse)
    ),
    tag = "Conversion"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, AppError> {
    let task = find_task(&state, &task_id)?;
    ensure_completed(&task)?;

    if let (Some(object_key), Some(storage)) = (&task.object_key, &state.storage) {
        let url = storage.share_url(object_key, SHARE_LINK_TTL).await?;
        let usage = format!(
            "Open the URL in a browser, or run: curl -o \"{}\" \"{}\"",
            task.download_filename(),
            url
        );
        return Ok(Json(DownloadLinkResponse {
            url,
            message: "Use this URL to access the file directly".to_string(),
            usage,
        })
        .into_response());
    }

    let converted = task.converted_file.as_ref().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Completed task {} has no output file", task.id))
    })?;

    let file = match tokio::fs::File::open(converted).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Converted file is no longer available"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let filename = task.download_filename();
    tracing::info!(task_id = %task.id, filename = %filename, "Serving converted file");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&filename)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Get a shareable object-storage link for a converted file
#[utoipa::path(
    get,
    path = "/share/{task_id}",
    params(("task_id" = String, Path, description = "Task id returned by /convert")),
    responses(
        (status = 200, description = "Presigned link", body = ShareLinkResponse),
        (status = 400, description = "Task not completed or not staged in object storage", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Unknown task", body = crate::dtos::ErrorResponse)
    ),
    tag = "Conversion"
)]
pub async fn get_share_link(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ShareLinkResponse>, AppError> {
    let task = find_task(&state, &task_id)?;
    ensure_completed(&task)?;

    let no_link = || {
        AppError::BadRequest(anyhow::anyhow!(
            "No share link is available for this file, use the download API"
        ))
    };
    let object_key = task.object_key.as_deref().ok_or_else(no_link)?;
    let storage = state.storage.as_ref().ok_or_else(no_link)?;

    let url = storage.share_url(object_key, SHARE_LINK_TTL).await?;
    let filename = task.download_filename();

    Ok(Json(ShareLinkResponse {
        download_command: format!("curl -o \"{}\" \"{}\"", filename, url),
        wget_command: format!("wget -O \"{}\" \"{}\"", filename, url),
        expires: SHARE_LINK_EXPIRY_LABEL.to_string(),
        url,
    }))
}

/// Bodies over the upload limit map to 413, everything else to 400.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    let error = anyhow::anyhow!("{}: {}", context, err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(error)
    } else {
        AppError::BadRequest(error)
    }
}

fn find_task(state: &AppState, raw_id: &str) -> Result<ConversionTask, AppError> {
    Uuid::parse_str(raw_id)
        .ok()
        .and_then(|id| state.registry.get(&id))
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Task not found")))
}

fn ensure_completed(task: &ConversionTask) -> Result<(), AppError> {
    if task.status == TaskStatus::Completed {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Task is not completed yet, current status: {}",
            task.status
        )))
    }
}

/// `attachment` disposition with an ASCII fallback name and the exact name in
/// RFC 5987 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
