pub mod failure_writer;
pub mod follow_up;
pub mod parameter_resolver;
pub mod state_poller;

pub use failure_writer::FailureWriter;
pub use follow_up::{FollowUpAction, NoopAction, ScriptAction};
pub use parameter_resolver::{class_count, particle_count};
pub use state_poller::{sleep_or_cancel, RetryPolicy, StatePoller};
