use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::compute::ComputeService;
use crate::dispatch::{FailureKind, Job, Outcome};
use crate::router::RoutePredicate;
use crate::task::InvocationTask;

/// Payload reshaping function applied before or after the task chain.
pub type TransformFn = fn(&Value) -> anyhow::Result<Value>;

/// Result of running one pipeline: the outcome plus how many compute
/// attempts were spent reaching it.
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: Outcome,
    pub attempts: u32,
}

/// The fixed processing path for one vendor/model family.
///
/// A pipeline pairs its routing predicate with a task chain and any
/// payload shaping around it. Membership and task order are fixed at
/// construction; a registered pipeline is never mutated, so it is safe
/// to share across concurrently dispatched jobs.
pub struct Pipeline {
    pub name: String,
    pub predicate: RoutePredicate,
    pub tasks: Vec<InvocationTask>,
    pub pre_transform: Option<TransformFn>,
    pub post_transform: Option<TransformFn>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, predicate: RoutePredicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            tasks: Vec::new(),
            pre_transform: None,
            post_transform: None,
        }
    }

    pub fn task(mut self, task: InvocationTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn pre(mut self, transform: TransformFn) -> Self {
        self.pre_transform = Some(transform);
        self
    }

    pub fn post(mut self, transform: TransformFn) -> Self {
        self.post_transform = Some(transform);
        self
    }

    /// Run the pipeline against a job: pre-transform → task chain →
    /// post-transform.
    ///
    /// Tasks run strictly in sequence; the output of one feeds the next.
    /// A task with a `result_key` writes its raw output under that key
    /// in the result object, otherwise the output replaces the result.
    /// Task failures propagate unchanged; transform failures are
    /// reported as `PayloadShape`, attributed to this pipeline.
    pub async fn execute(
        &self,
        client: &impl ComputeService,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Execution {
        let mut attempts = 0;

        let mut current = match self.pre_transform {
            Some(transform) => match transform(&job.payload) {
                Ok(shaped) => shaped,
                Err(err) => {
                    return Execution {
                        outcome: Outcome::Failure(FailureKind::PayloadShape(format!(
                            "pipeline '{}': {err}",
                            self.name
                        ))),
                        attempts,
                    };
                }
            },
            None => job.payload.clone(),
        };

        let mut result = Value::Null;
        for task in &self.tasks {
            match task.invoke(client, &job.model_id, &current, cancel).await {
                Ok(task_result) => {
                    attempts += task_result.attempts;
                    match &task.result_key {
                        Some(key) => {
                            if !result.is_object() {
                                result = Value::Object(serde_json::Map::new());
                            }
                            if let Some(map) = result.as_object_mut() {
                                map.insert(key.clone(), task_result.output.clone());
                            }
                        }
                        None => result = task_result.output.clone(),
                    }
                    current = task_result.output;
                }
                Err(failure) => {
                    attempts += failure.attempts;
                    return Execution {
                        outcome: Outcome::Failure(failure.kind),
                        attempts,
                    };
                }
            }
        }

        let shaped = match self.post_transform {
            Some(transform) => match transform(&result) {
                Ok(shaped) => shaped,
                Err(err) => {
                    return Execution {
                        outcome: Outcome::Failure(FailureKind::PayloadShape(format!(
                            "pipeline '{}': {err}",
                            self.name
                        ))),
                        attempts,
                    };
                }
            },
            None => result,
        };

        Execution {
            outcome: Outcome::Success(shaped),
            attempts,
        }
    }
}
