pub mod metrics;
pub mod registry;
pub mod storage;

pub use metrics::{get_metrics, init_metrics};
pub use registry::TaskRegistry;
pub use storage::{S3Storage, Storage, SHARE_LINK_TTL};
