use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::{FailureKind, Job, JobStatus, Outcome};

/// The states of the dispatch state machine.
///
/// Each job flows through: START → ROUTING → EXECUTING(pipeline) →
/// SUCCESS / FAILURE. The machine is flat: there is no cycle back to
/// ROUTING and pipelines never re-enter the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Start,
    Routing,
    /// Executing the named pipeline's task chain.
    Executing(String),
    Succeeded,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Start => write!(f, "START"),
            DispatchState::Routing => write!(f, "ROUTING"),
            DispatchState::Executing(name) => write!(f, "EXECUTING({name})"),
            DispatchState::Succeeded => write!(f, "SUCCESS"),
            DispatchState::Failed => write!(f, "FAILURE"),
        }
    }
}

/// Event fed into the state machine by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum StateInput {
    /// The job was handed to the engine.
    Dispatch,
    /// The router matched the named pipeline.
    Routed(String),
    /// No predicate matched. Carries the rendered fallback cause, which
    /// includes the literal unmatched model id.
    Unrouted(String),
    /// The selected pipeline finished with the given outcome.
    Finished(Outcome),
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next state.
    Next(DispatchState),
    /// The job has reached a terminal outcome.
    Complete(Outcome),
}

/// Drives a `Job` through the dispatch state machine.
pub struct StateMachine;

impl StateMachine {
    /// Compute and apply the next transition for the given job.
    ///
    /// - `Start` always advances to `Routing`.
    /// - `Routing` advances to `Executing` on a router match; a miss
    ///   completes with `UnrecognizedModel` carrying the rendered cause.
    /// - `Executing` completes with the pipeline's outcome, forwarded
    ///   unchanged.
    /// - Terminal states are absorbing: any further input returns the
    ///   recorded outcome without touching the job.
    /// - An input that does not apply to the current state leaves the job
    ///   unchanged and self-loops.
    pub fn next(job: &mut Job, input: StateInput) -> Transition {
        if job.is_terminal() {
            let recorded = job.outcome.clone().unwrap_or_else(|| match job.state {
                DispatchState::Succeeded => Outcome::Success(serde_json::Value::Null),
                _ => Outcome::Failure(FailureKind::TaskPermanent(
                    "terminal state without recorded outcome".into(),
                )),
            });
            return Transition::Complete(recorded);
        }

        let transition = match (&job.state, input) {
            (DispatchState::Start, StateInput::Dispatch) => {
                Transition::Next(DispatchState::Routing)
            }
            (DispatchState::Routing, StateInput::Routed(name)) => {
                Transition::Next(DispatchState::Executing(name))
            }
            (DispatchState::Routing, StateInput::Unrouted(cause)) => {
                Transition::Complete(Outcome::Failure(FailureKind::UnrecognizedModel(cause)))
            }
            (DispatchState::Executing(_), StateInput::Finished(outcome)) => {
                Transition::Complete(outcome)
            }
            // Input does not apply to the current state: self-loop.
            (state, _) => Transition::Next(state.clone()),
        };

        Self::apply(job, &transition);
        transition
    }

    fn apply(job: &mut Job, transition: &Transition) {
        match transition {
            Transition::Next(next_state) => {
                if *next_state != job.state {
                    job.state_history.push(job.state.clone());
                    job.state = next_state.clone();
                    if job.status == JobStatus::Pending {
                        job.status = JobStatus::InProgress;
                    }
                }
            }
            Transition::Complete(outcome) => {
                job.state_history.push(job.state.clone());
                match outcome {
                    Outcome::Success(_) => {
                        job.state = DispatchState::Succeeded;
                        job.status = JobStatus::Completed;
                    }
                    Outcome::Failure(_) => {
                        job.state = DispatchState::Failed;
                        job.status = JobStatus::Failed;
                    }
                }
                job.outcome = Some(outcome.clone());
            }
        }
        job.updated_at = chrono::Utc::now();
    }
}
