pub mod client;
pub mod error;

pub use client::HttpComputeClient;
pub use error::ComputeError;

use serde_json::Value;

/// Seam between the dispatch core and the external compute service.
///
/// One call per invocation attempt; implementations keep no state
/// between calls. Tests substitute mock implementations.
pub trait ComputeService {
    async fn invoke(&self, operation: &str, payload: &Value) -> Result<Value, ComputeError>;
}
