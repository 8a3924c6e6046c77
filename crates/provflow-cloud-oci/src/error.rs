//! Resource Manager back-end error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OciError {
    /// OCI config profile or API key unusable
    #[error("OCI config error: {0}")]
    Profile(String),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The API answered with a non-success status
    #[error("{status}-{code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OciError {
    /// Failures worth waiting out while a job is being watched
    pub fn is_transient(&self) -> bool {
        match self {
            OciError::Api { status, .. } => *status == 429 || *status >= 500,
            OciError::HttpError(_) | OciError::JsonError(_) => true,
            OciError::Profile(_) | OciError::Signing(_) | OciError::InvalidConfig(_) => false,
        }
    }
}

impl From<OciError> for provflow_cloud::CloudError {
    fn from(err: OciError) -> Self {
        use provflow_cloud::CloudError;
        match err {
            OciError::Profile(_) | OciError::InvalidConfig(_) => {
                CloudError::InvalidConfig(err.to_string())
            }
            OciError::JsonError(e) => CloudError::Json(e),
            OciError::Api { .. } | OciError::Signing(_) | OciError::HttpError(_) => {
                CloudError::ApiError(err.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, OciError>;
