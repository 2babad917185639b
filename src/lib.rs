//! RUMO — a model-aware dispatch engine.
//!
//! A generation job carries a model identifier; the engine evaluates an
//! ordered table of routing predicates, hands the job to the first
//! matching vendor pipeline, runs that pipeline's retry/timeout-wrapped
//! invocation tasks against an external compute service, and resolves
//! to exactly one terminal [`Outcome`](dispatch::Outcome). Jobs whose
//! model matches no predicate terminate in an explicit
//! unrecognized-model failure without invoking anything.

pub mod catalog;
pub mod cli;
pub mod compute;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod router;
pub mod status;
pub mod task;
pub mod ui;

pub use compute::{ComputeService, HttpComputeClient};
pub use dispatch::{AuditRecord, FailureKind, Job, JobStatus, Outcome, RetryPolicy};
pub use engine::DispatchEngine;
pub use pipeline::Pipeline;
pub use router::{Router, RoutePredicate};
pub use task::InvocationTask;
