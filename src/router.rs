use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;

/// Declarative routing predicate over a job's model identifier.
///
/// Predicates are pure data: total, side-effect-free and deterministic,
/// so routing depends only on the registration list and the model id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutePredicate {
    /// Matches the model id exactly.
    Exact(String),
    /// Matches model ids starting with the given prefix.
    Prefix(String),
    /// Matches model ids containing the given fragment.
    Contains(String),
}

impl RoutePredicate {
    pub fn matches(&self, model_id: &str) -> bool {
        match self {
            RoutePredicate::Exact(id) => model_id == id,
            RoutePredicate::Prefix(prefix) => model_id.starts_with(prefix.as_str()),
            RoutePredicate::Contains(fragment) => model_id.contains(fragment.as_str()),
        }
    }
}

impl fmt::Display for RoutePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePredicate::Exact(id) => write!(f, "model == '{id}'"),
            RoutePredicate::Prefix(prefix) => write!(f, "model starts with '{prefix}'"),
            RoutePredicate::Contains(fragment) => write!(f, "model contains '{fragment}'"),
        }
    }
}

/// Selects the pipeline for a model id from an ordered registration list.
///
/// Predicates are evaluated in registration order and the first match
/// wins: when two predicates could both match the same identifier, the
/// earlier-registered pipeline is selected. This ordering is documented
/// behavior, not an accident of implementation. `None` is the normal
/// "no match" value, not an error; selection itself cannot fail and has
/// no side effects.
pub struct Router;

impl Router {
    pub fn select<'a>(pipelines: &'a [Pipeline], model_id: &str) -> Option<&'a Pipeline> {
        pipelines
            .iter()
            .find(|pipeline| pipeline.predicate.matches(model_id))
    }
}
