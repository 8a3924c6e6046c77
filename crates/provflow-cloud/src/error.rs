//! Provisioning error types

use thiserror::Error;

/// Errors raised by provisioning back-ends and the core crate
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
