use thiserror::Error;

use crate::compute::ComputeError;

#[derive(Debug, Error)]
pub enum RumoError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Job payload error: {0}")]
    Payload(String),

    #[error("Compute service error: {0}")]
    Compute(#[from] ComputeError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
