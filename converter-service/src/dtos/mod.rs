pub mod conversion;

pub use conversion::{
    ConvertAccepted, ConvertParams, ConvertUpload, DownloadLinkResponse, ErrorResponse,
    HealthResponse, ShareLinkResponse, TaskStatusResponse,
};
