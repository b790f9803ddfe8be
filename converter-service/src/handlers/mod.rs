pub mod conversion;
pub mod docs;
pub mod health;

pub use conversion::{convert_file, download_file, get_share_link, get_status};
pub use docs::{openapi_json, swagger_ui};
pub use health::{health_check, metrics_endpoint, readiness_check};
