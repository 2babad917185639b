use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::compute::ComputeService;
use crate::dispatch::{FailureKind, Job, Outcome, StateInput, StateMachine, Transition};
use crate::pipeline::Pipeline;
use crate::router::Router;
use crate::status::StatusSink;

/// The executable dispatch unit: router + pipelines + terminal states.
///
/// Pipeline registration is fixed at construction; the engine is
/// read-only afterwards and safe to share across concurrently
/// dispatched jobs. Per-job state lives in the `Job` value handed to
/// `dispatch`, never in the engine.
pub struct DispatchEngine<C> {
    pipelines: Vec<Pipeline>,
    client: C,
    sink: Option<Arc<dyn StatusSink>>,
    /// Cause template for the unrecognized-model failure; `{model}` is
    /// replaced with the job's model id.
    fallback_template: String,
}

impl<C: ComputeService> DispatchEngine<C> {
    /// Build an engine from an ordered pipeline registration list.
    pub fn new(pipelines: Vec<Pipeline>, client: C) -> Self {
        Self {
            pipelines,
            client,
            sink: None,
            fallback_template: "{model}".to_string(),
        }
    }

    /// Attach a status sink receiving terminal `{job_id, item_id,
    /// status}` transitions.
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the fallback cause template. `{model}` is replaced with
    /// the unmatched model id; the rendered cause always carries the
    /// literal identifier when the template keeps the placeholder.
    pub fn with_fallback_message(mut self, template: impl Into<String>) -> Self {
        self.fallback_template = template.into();
        self
    }

    /// The ordered registration list, as routed.
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// Dispatch a job to its terminal outcome.
    pub async fn dispatch(&self, job: &mut Job) -> Outcome {
        self.dispatch_with_cancel(job, &CancellationToken::new())
            .await
    }

    /// Dispatch a job, honoring cancellation up to and including an
    /// in-flight invocation attempt.
    ///
    /// Exactly one pipeline (or the fallback) executes per job. A job
    /// that already reached a terminal state is never resumed: its
    /// recorded outcome is returned unchanged.
    pub async fn dispatch_with_cancel(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Outcome {
        // Absorbing terminal states: the machine replays the recorded
        // outcome without mutating the job.
        if job.is_terminal() {
            if let Transition::Complete(outcome) =
                StateMachine::next(job, StateInput::Dispatch)
            {
                return outcome;
            }
        }

        // Start → Routing, unconditional.
        StateMachine::next(job, StateInput::Dispatch);

        // Routing: first predicate match wins, fallback otherwise.
        let selected = match Router::select(&self.pipelines, &job.model_id) {
            Some(pipeline) => pipeline,
            None => {
                let cause = self.fallback_template.replace("{model}", &job.model_id);
                let transition = StateMachine::next(job, StateInput::Unrouted(cause));
                self.emit_status(job);
                return match transition {
                    Transition::Complete(outcome) => outcome,
                    Transition::Next(_) => {
                        Outcome::Failure(FailureKind::UnrecognizedModel(
                            job.model_id.clone(),
                        ))
                    }
                };
            }
        };

        StateMachine::next(job, StateInput::Routed(selected.name.clone()));

        // Executing: run the selected task chain to completion or failure.
        let execution = selected.execute(&self.client, job, cancel).await;
        job.attempts += execution.attempts;

        let outcome = execution.outcome;
        StateMachine::next(job, StateInput::Finished(outcome.clone()));
        self.emit_status(job);
        outcome
    }

    fn emit_status(&self, job: &Job) {
        if let Some(sink) = &self.sink {
            sink.record(&job.id, &job.item_id, job.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ComputeError;
    use crate::dispatch::{DispatchState, FailureKind, JobStatus, RetryPolicy};
    use crate::router::RoutePredicate;
    use crate::status::MemorySink;
    use crate::task::InvocationTask;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ScriptedCompute {
        script: Mutex<VecDeque<Result<Value, ComputeError>>>,
        calls: AtomicU32,
    }

    impl ScriptedCompute {
        fn new(script: Vec<Result<Value, ComputeError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ComputeService for ScriptedCompute {
        async fn invoke(&self, _operation: &str, _payload: &Value) -> Result<Value, ComputeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"ok": true})))
        }
    }

    /// Never responds; every attempt runs into the per-attempt timeout.
    struct StalledCompute;

    impl ComputeService for StalledCompute {
        async fn invoke(&self, _operation: &str, _payload: &Value) -> Result<Value, ComputeError> {
            std::future::pending().await
        }
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            timeout_ms: 100,
        }
    }

    fn vendor_pipelines(max_attempts: u32) -> Vec<Pipeline> {
        vec![
            Pipeline::new("vendor-a", RoutePredicate::Prefix("vendorA.".into())).task(
                InvocationTask::new("model/{model}/invoke").with_retry(quick(max_attempts)),
            ),
            Pipeline::new("vendor-b", RoutePredicate::Prefix("vendorB.".into())).task(
                InvocationTask::new("model/{model}/invoke").with_retry(quick(max_attempts)),
            ),
        ]
    }

    #[test]
    fn pipelines_accessor_preserves_registration_order() {
        let engine = DispatchEngine::new(vendor_pipelines(3), ScriptedCompute::new(vec![]));
        let names: Vec<&str> = engine.pipelines().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["vendor-a", "vendor-b"]);
    }

    #[tokio::test]
    async fn scenario_a_prefix_match_succeeds() {
        let client = ScriptedCompute::new(vec![Ok(json!({"completion": "done"}))]);
        let engine = DispatchEngine::new(vendor_pipelines(3), client);
        let mut job = Job::new("vendorA.textModel", json!({"prompt": "hi"}));

        let outcome = engine.dispatch(&mut job).await;
        assert_eq!(outcome, Outcome::Success(json!({"completion": "done"})));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.state_history,
            vec![
                DispatchState::Start,
                DispatchState::Routing,
                DispatchState::Executing("vendor-a".into()),
            ]
        );
        assert_eq!(job.state, DispatchState::Succeeded);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn scenario_b_unrecognized_model_carries_literal_id() {
        let client = ScriptedCompute::new(vec![]);
        let engine = DispatchEngine::new(vendor_pipelines(3), client);
        let mut job = Job::new("unknown.modelX", json!({}));

        let outcome = engine.dispatch(&mut job).await;
        match &outcome {
            Outcome::Failure(kind @ FailureKind::UnrecognizedModel(cause)) => {
                assert_eq!(cause, "unknown.modelX");
                assert!(kind.to_string().contains("'unknown.modelX'"));
            }
            other => panic!("expected UnrecognizedModel, got {other:?}"),
        }
        assert_eq!(job.state, DispatchState::Failed);
        // No task was invoked on the fallback path.
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_c_timeouts_on_all_attempts_exhaust() {
        let client = StalledCompute;
        let engine = DispatchEngine::new(vendor_pipelines(3), client);
        let mut job = Job::new("vendorB.chatModel", json!({}));

        let outcome = engine.dispatch(&mut job).await;
        match outcome {
            Outcome::Failure(FailureKind::TimeoutExhausted(cause)) => {
                assert!(cause.contains("3 attempts"));
            }
            other => panic!("expected TimeoutExhausted, got {other:?}"),
        }
        assert_eq!(job.attempts, 3);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_d_cancellation_during_backoff() {
        let client = ScriptedCompute::new(vec![
            Err(ComputeError::Service {
                status: 503,
                message: "busy".into(),
            }),
            Err(ComputeError::Service {
                status: 503,
                message: "busy".into(),
            }),
        ]);
        let slow = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 60_000,
            timeout_ms: 1000,
        };
        let pipelines = vec![
            Pipeline::new("vendor-a", RoutePredicate::Prefix("vendorA.".into()))
                .task(InvocationTask::new("op").with_retry(slow)),
        ];
        let engine = Arc::new(DispatchEngine::new(pipelines, client));
        let cancel = CancellationToken::new();

        let worker = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut job = Job::new("vendorA.textModel", json!({}));
                let outcome = engine.dispatch_with_cancel(&mut job, &cancel).await;
                (outcome, job)
            })
        };

        // Cancel while the backoff between attempt 1 and 2 is pending.
        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
        let (outcome, job) = worker.await.unwrap();

        // No second attempt; the outcome reflects cancellation, not
        // retry exhaustion.
        assert_eq!(job.attempts, 1);
        assert!(matches!(
            outcome,
            Outcome::Failure(FailureKind::Cancelled(_))
        ));
        assert!(job.is_terminal());
    }

    #[tokio::test]
    async fn first_matching_pipeline_wins_through_the_engine() {
        let client = ScriptedCompute::new(vec![]);
        let pipelines = vec![
            Pipeline::new("broad", RoutePredicate::Prefix("vendorA.".into()))
                .task(InvocationTask::new("op").with_retry(quick(1))),
            Pipeline::new("narrow", RoutePredicate::Exact("vendorA.textModel".into()))
                .task(InvocationTask::new("op").with_retry(quick(1))),
        ];
        let engine = DispatchEngine::new(pipelines, client);
        let mut job = Job::new("vendorA.textModel", json!({}));

        engine.dispatch(&mut job).await;
        assert!(
            job.state_history
                .contains(&DispatchState::Executing("broad".into()))
        );
    }

    #[tokio::test]
    async fn routing_is_deterministic_across_jobs() {
        let client = ScriptedCompute::new(vec![]);
        let engine = DispatchEngine::new(vendor_pipelines(1), client);

        for _ in 0..3 {
            let mut job = Job::new("vendorB.chat", json!({}));
            engine.dispatch(&mut job).await;
            assert!(
                job.state_history
                    .contains(&DispatchState::Executing("vendor-b".into()))
            );
        }
    }

    #[tokio::test]
    async fn terminal_job_is_never_resumed() {
        let client = ScriptedCompute::new(vec![Ok(json!("first"))]);
        let engine = DispatchEngine::new(vendor_pipelines(3), client);
        let mut job = Job::new("vendorA.textModel", json!({}));

        let first = engine.dispatch(&mut job).await;
        assert_eq!(first, Outcome::Success(json!("first")));
        let history_len = job.state_history.len();

        let second = engine.dispatch(&mut job).await;
        assert_eq!(second, first);
        assert_eq!(job.state_history.len(), history_len);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn status_sink_receives_terminal_transitions() {
        let sink = Arc::new(MemorySink::new());
        let client = ScriptedCompute::new(vec![Ok(json!("ok"))]);
        let engine =
            DispatchEngine::new(vendor_pipelines(3), client).with_status_sink(sink.clone());

        let mut ok_job = Job::with_ids("j1", "i1", "vendorA.textModel", json!({}));
        engine.dispatch(&mut ok_job).await;
        let mut missed_job = Job::with_ids("j2", "i2", "unknown.modelX", json!({}));
        engine.dispatch(&mut missed_job).await;

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].job_id, "j1");
        assert_eq!(records[0].status, JobStatus::Completed);
        assert_eq!(records[1].job_id, "j2");
        assert_eq!(records[1].item_id, "i2");
        assert_eq!(records[1].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn custom_fallback_template_keeps_the_model_id() {
        let client = ScriptedCompute::new(vec![]);
        let engine = DispatchEngine::new(vendor_pipelines(1), client)
            .with_fallback_message("no pipeline registered for '{model}'");
        let mut job = Job::new("unknown.modelX", json!({}));

        match engine.dispatch(&mut job).await {
            Outcome::Failure(FailureKind::UnrecognizedModel(cause)) => {
                assert_eq!(cause, "no pipeline registered for 'unknown.modelX'");
            }
            other => panic!("expected UnrecognizedModel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_attempts_are_recorded_on_the_job() {
        let client = ScriptedCompute::new(vec![
            Err(ComputeError::Service {
                status: 503,
                message: "busy".into(),
            }),
            Ok(json!("ok")),
        ]);
        let engine = DispatchEngine::new(vendor_pipelines(3), client);
        let mut job = Job::new("vendorA.textModel", json!({}));

        let outcome = engine.dispatch(&mut job).await;
        assert_eq!(outcome, Outcome::Success(json!("ok")));
        assert_eq!(job.attempts, 2);
    }

    #[tokio::test]
    async fn engine_is_shared_across_concurrent_dispatches() {
        let client = ScriptedCompute::new(vec![]);
        let engine = Arc::new(DispatchEngine::new(vendor_pipelines(1), client));

        let mut workers = Vec::new();
        for n in 0..4 {
            let engine = engine.clone();
            workers.push(tokio::spawn(async move {
                let model = if n % 2 == 0 {
                    "vendorA.textModel"
                } else {
                    "vendorB.chatModel"
                };
                let mut job = Job::new(model, json!({}));
                engine.dispatch(&mut job).await
            }));
        }
        for worker in workers {
            assert!(matches!(
                worker.await.unwrap(),
                Outcome::Success(_)
            ));
        }
    }
}
