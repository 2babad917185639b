use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::ComputeService;
use super::error::ComputeError;

/// HTTP client for the external compute service.
///
/// Operations are relative paths under the configured base URL, invoked
/// as `POST {base_url}/{operation}` with a JSON payload. Credentials are
/// attached as an `x-api-key` header when configured.
pub struct HttpComputeClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl HttpComputeClient {
    /// Create a client pointing at the given service base URL.
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            api_key,
            client,
            base_url,
        }
    }
}

impl ComputeService for HttpComputeClient {
    async fn invoke(&self, operation: &str, payload: &Value) -> Result<Value, ComputeError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            operation.trim_start_matches('/')
        );

        let mut request = self.client.post(&url).header("content-type", "application/json");
        if !self.api_key.is_empty() {
            request = request.header("x-api-key", &self.api_key);
        }

        let response = request.json(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                ComputeError::Timeout
            } else {
                ComputeError::Network(e)
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(ComputeError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            if status.is_client_error() {
                return Err(ComputeError::InvalidRequest {
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(ComputeError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ComputeError::Parse(e.to_string()))
    }
}
