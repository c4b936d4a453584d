//! Data models for loudness monitoring

pub mod loudness;
pub mod run_summary;
pub mod stream;

pub use loudness::{ClassifiedRecord, LoudnessSummary, Status};
pub use run_summary::{RunSummary, SchedulerState, StreamOutcome};
pub use stream::{Profile, ProfileSelection, StreamDescriptor};
