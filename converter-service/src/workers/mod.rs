mod executor;
pub mod housekeeping;
mod office;
mod orchestrator;

pub use executor::{CommandError, CommandExecutor};
pub use housekeeping::{Housekeeper, SweepReport};
pub use office::{ConversionError, OfficeConverter};
pub use orchestrator::{ConversionJob, JobQueue, WorkerOrchestrator};
