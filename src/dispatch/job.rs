use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::state::DispatchState;

/// Closed set of terminal failure kinds a dispatch can produce.
///
/// Each variant carries the human-readable cause forwarded to the caller.
/// Kinds are assigned where the failure originates and are never
/// reinterpreted on the way up: the task classifies its own errors, the
/// pipeline owns payload shaping errors, and the router fallback owns
/// `UnrecognizedModel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No routing predicate matched the job's model id. Carries the
    /// literal unmatched identifier.
    UnrecognizedModel(String),
    /// A pre/post-transform rejected the payload. Attributed to the
    /// pipeline, not the task.
    PayloadShape(String),
    /// The compute service rejected the request; not retriable.
    TaskPermanent(String),
    /// A transient failure with retries disabled (`max_attempts == 1`).
    TaskTransient(String),
    /// Transient failures or timeouts persisted through every attempt.
    TimeoutExhausted(String),
    /// Dispatch was cancelled before reaching a natural outcome.
    Cancelled(String),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::UnrecognizedModel(id) => write!(f, "unrecognized model '{id}'"),
            FailureKind::PayloadShape(msg) => write!(f, "payload shape error: {msg}"),
            FailureKind::TaskPermanent(msg) => write!(f, "permanent task error: {msg}"),
            FailureKind::TaskTransient(msg) => write!(f, "transient task error: {msg}"),
            FailureKind::TimeoutExhausted(msg) => write!(f, "retries exhausted: {msg}"),
            FailureKind::Cancelled(msg) => write!(f, "dispatch cancelled: {msg}"),
        }
    }
}

/// Terminal value of one dispatched job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(Value),
    Failure(FailureKind),
}

/// Tracks the lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Retry behavior for one invocation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Calculate the backoff delay after a given failed attempt.
    /// delay = base_delay_ms * 2^(attempt - 1), saturating at u64::MAX
    /// so a large attempt count never overflows.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        1u64.checked_shl(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .unwrap_or(u64::MAX)
    }
}

/// A generation job entering the dispatch engine.
///
/// `model_id` and `payload` are input data and are never mutated once
/// dispatch begins; the remaining fields track the dispatch lifecycle.
/// `id` and `item_id` are opaque correlation identifiers passed through
/// unmodified and never interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub item_id: String,
    pub model_id: String,
    pub payload: Value,
    pub status: JobStatus,
    pub state: DispatchState,
    pub state_history: Vec<DispatchState>,
    /// Total compute attempts made across the selected task chain.
    pub attempts: u32,
    /// Recorded terminal outcome, set exactly once.
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(model_id: impl Into<String>, payload: Value) -> Self {
        Self::with_ids(
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
            model_id,
            payload,
        )
    }

    /// Build a job with caller-supplied correlation identifiers.
    pub fn with_ids(
        id: impl Into<String>,
        item_id: impl Into<String>,
        model_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            item_id: item_id.into(),
            model_id: model_id.into(),
            payload,
            status: JobStatus::Pending,
            state: DispatchState::Start,
            state_history: Vec::new(),
            attempts: 0,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the job has reached an absorbing state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            DispatchState::Succeeded | DispatchState::Failed
        )
    }
}

/// Structured audit record produced at job completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub job_id: String,
    pub item_id: String,
    pub model_id: String,
    pub status: JobStatus,
    pub state_transitions: Vec<DispatchState>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AuditRecord {
    /// Generate an audit record from a completed or failed job.
    pub fn from_job(job: &Job) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state.clone());

        Self {
            job_id: job.id.clone(),
            item_id: job.item_id.clone(),
            model_id: job.model_id.clone(),
            status: job.status,
            state_transitions: transitions,
            attempts: job.attempts,
            started_at: job.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
