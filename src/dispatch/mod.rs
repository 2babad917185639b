mod job;
mod state;

pub use job::{AuditRecord, FailureKind, Job, JobStatus, Outcome, RetryPolicy};
pub use state::{DispatchState, StateInput, StateMachine, Transition};
