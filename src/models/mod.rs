pub mod job;
pub mod loaders;
pub mod metadata;
pub mod selection;

pub use job::{JobHandle, JobId, JobRef, JobStatus};
pub use loaders::load_job_metadata;
pub use metadata::{JobMetadata, OutputResult};
pub use selection::{SelectionTask, TaskOutcome, TaskStatus};
