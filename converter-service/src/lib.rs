pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod workers;

pub use startup::{AppState, Application};

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Office Document Conversion Service",
        description = "Converts legacy .doc, .xls and .ppt files to their Office Open XML formats"
    ),
    paths(
        handlers::conversion::convert_file,
        handlers::conversion::get_status,
        handlers::conversion::download_file,
        handlers::conversion::get_share_link,
        handlers::health::health_check,
        handlers::health::readiness_check,
    ),
    components(
        schemas(
            dtos::ConvertUpload,
            dtos::ConvertAccepted,
            dtos::TaskStatusResponse,
            dtos::DownloadLinkResponse,
            dtos::ShareLinkResponse,
            dtos::HealthResponse,
            dtos::ErrorResponse,
            models::ConversionKind,
            models::TaskStatus,
        )
    ),
    tags(
        (name = "Conversion", description = "Upload, track and fetch document conversions"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;
