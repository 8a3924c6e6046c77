//! Terraform back-end error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("terraform not found ({0}). Please install: https://developer.hashicorp.com/terraform/install")]
    TerraformNotFound(String),

    #[error("configuration directory not found: {0}")]
    ConfigDirNotFound(String),

    #[error("terraform {command} failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error("unexpected terraform output: {0}")]
    InvalidOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<TerraformError> for provflow_cloud::CloudError {
    fn from(err: TerraformError) -> Self {
        use provflow_cloud::CloudError;
        match err {
            TerraformError::TerraformNotFound(_) => CloudError::ToolNotFound(err.to_string()),
            TerraformError::ConfigDirNotFound(_) => CloudError::InvalidConfig(err.to_string()),
            TerraformError::CommandFailed { .. } => CloudError::CommandFailed(err.to_string()),
            TerraformError::InvalidOutput(_) => CloudError::CommandFailed(err.to_string()),
            TerraformError::JsonError(e) => CloudError::Json(e),
            TerraformError::IoError(e) => CloudError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, TerraformError>;
