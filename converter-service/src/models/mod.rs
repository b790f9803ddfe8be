pub mod conversion;
pub mod task;

pub use conversion::ConversionKind;
pub use task::{ConversionTask, TaskStatus};
