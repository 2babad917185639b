use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::compute::{ComputeError, ComputeService};
use crate::dispatch::{FailureKind, RetryPolicy};

/// A single retry/timeout-wrapped call against the external compute
/// service.
///
/// The operation reference is a relative path; a `{model}` placeholder
/// is substituted with the job's model id at invocation time. A task
/// keeps no state between invocations: every call starts a fresh
/// attempt counter.
#[derive(Debug, Clone)]
pub struct InvocationTask {
    /// Target operation, e.g. `model/{model}/invoke`.
    pub operation: String,
    pub retry: RetryPolicy,
    /// Key under which the raw output lands in the job's result object.
    /// `None` replaces the whole result with the output.
    pub result_key: Option<String>,
}

/// Raw response plus invocation metadata.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub output: Value,
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// A classified task failure plus how many attempts were spent on it.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub attempts: u32,
}

impl InvocationTask {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            retry: RetryPolicy::default(),
            result_key: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }

    fn resolve_operation(&self, model_id: &str) -> String {
        self.operation.replace("{model}", model_id)
    }

    /// Attempt the external call, retrying transient failures.
    ///
    /// - Each attempt is bounded by `retry.timeout_ms`; exceeding it
    ///   counts as a transient failure.
    /// - Transient failures (timeout, rate limit, 5xx, network) retry
    ///   with exponential backoff up to `retry.max_attempts` total
    ///   attempts; a rate-limit `retry-after` hint stretches the delay.
    /// - Permanent failures fail immediately after exactly one attempt.
    /// - Exhaustion surfaces `TimeoutExhausted`; when retries are
    ///   disabled (`max_attempts == 1`) a transient failure surfaces
    ///   as `TaskTransient` instead.
    /// - Cancellation interrupts an in-flight attempt and prevents the
    ///   next attempt from starting during backoff.
    pub async fn invoke(
        &self,
        client: &impl ComputeService,
        model_id: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<TaskResult, TaskFailure> {
        let operation = self.resolve_operation(model_id);
        let max_attempts = self.retry.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TaskFailure {
                    kind: FailureKind::Cancelled(format!(
                        "before attempt {} of '{operation}'",
                        attempt + 1
                    )),
                    attempts: attempt,
                });
            }
            attempt += 1;

            let call = timeout(
                Duration::from_millis(self.retry.timeout_ms),
                client.invoke(&operation, payload),
            );
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TaskFailure {
                        kind: FailureKind::Cancelled(format!(
                            "during attempt {attempt} of '{operation}'"
                        )),
                        attempts: attempt,
                    });
                }
                result = call => result,
            };

            // retry-after hint from a rate-limited attempt
            let mut delay_hint_ms: Option<u64> = None;
            let cause = match result {
                Ok(Ok(output)) => {
                    return Ok(TaskResult {
                        output,
                        attempts: attempt,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Ok(Err(err)) if !err.is_transient() => {
                    return Err(TaskFailure {
                        kind: FailureKind::TaskPermanent(err.to_string()),
                        attempts: attempt,
                    });
                }
                Ok(Err(err)) => {
                    if let ComputeError::RateLimited { retry_after_ms } = &err {
                        delay_hint_ms = Some(*retry_after_ms);
                    }
                    err.to_string()
                }
                Err(_) => format!("attempt timed out after {}ms", self.retry.timeout_ms),
            };

            if attempt >= max_attempts {
                let kind = if max_attempts == 1 {
                    FailureKind::TaskTransient(cause)
                } else {
                    FailureKind::TimeoutExhausted(format!(
                        "{max_attempts} attempts against '{operation}': {cause}"
                    ))
                };
                return Err(TaskFailure {
                    kind,
                    attempts: attempt,
                });
            }

            let backoff = self.retry.delay_for_attempt(attempt);
            let delay_ms = delay_hint_ms.map_or(backoff, |hint| hint.max(backoff));
            log_retry(attempt, max_attempts, &cause, delay_ms);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TaskFailure {
                        kind: FailureKind::Cancelled(format!(
                            "during backoff after attempt {attempt} of '{operation}'"
                        )),
                        attempts: attempt,
                    });
                }
                _ = sleep(Duration::from_millis(delay_ms)) => {}
            }
        }
    }
}

fn log_retry(attempt: u32, max: u32, reason: &str, delay_ms: u64) {
    eprintln!("  ↻ Retry {attempt}/{max}: {reason} (waiting {delay_ms}ms)");
}
