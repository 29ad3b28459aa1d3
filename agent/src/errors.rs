//! Error types for the host OS update agent

use thiserror::Error;

/// Main error type for the update agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Update reported done but version did not advance (target {target}, current {current})")]
    VersionRegression { target: String, current: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
