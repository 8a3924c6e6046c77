//! Attempt types shared by the back-ends and the retry controller

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outputs reported by a successful apply (output name -> value)
pub type Outputs = BTreeMap<String, serde_json::Value>;

/// Classified kind of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No error (the attempt succeeded, or nothing has run yet)
    #[default]
    None,
    /// Provider has no capacity for the requested shape right now
    CapacityExhausted,
    /// The request itself is invalid; the configuration must be edited
    MalformedRequest,
    /// Credentials were rejected
    AuthFailure,
    /// A service limit or quota is exhausted
    LimitExceeded,
    /// Nothing recognisable in the output
    Unknown,
}

impl ErrorKind {
    /// Whether the controller keeps going after this kind
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::CapacityExhausted | ErrorKind::Unknown)
    }

    /// Whether this kind terminates the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedRequest | ErrorKind::AuthFailure | ErrorKind::LimitExceeded
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::None => write!(f, "none"),
            ErrorKind::CapacityExhausted => write!(f, "capacity-exhausted"),
            ErrorKind::MalformedRequest => write!(f, "malformed-request"),
            ErrorKind::AuthFailure => write!(f, "auth-failure"),
            ErrorKind::LimitExceeded => write!(f, "limit-exceeded"),
            ErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Unclassified outcome of one back-end apply
#[derive(Debug, Clone, Default)]
pub struct RawAttempt {
    /// Whether the apply reported success
    pub succeeded: bool,

    /// Captured output (process output or concatenated job log entries)
    pub raw_output: String,

    /// Outputs of the applied configuration, when it succeeded
    pub outputs: Outputs,
}

impl RawAttempt {
    pub fn success(raw_output: impl Into<String>, outputs: Outputs) -> Self {
        Self {
            succeeded: true,
            raw_output: raw_output.into(),
            outputs,
        }
    }

    pub fn failure(raw_output: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            raw_output: raw_output.into(),
            outputs: Outputs::new(),
        }
    }
}

/// Classified outcome of one provisioning attempt
///
/// Built by the controller once per attempt and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    succeeded: bool,
    raw_output: String,
    error_kind: ErrorKind,
    message: String,
    outputs: Outputs,
}

impl AttemptResult {
    pub fn succeeded(raw_output: String, outputs: Outputs) -> Self {
        Self {
            succeeded: true,
            raw_output,
            error_kind: ErrorKind::None,
            message: "apply completed".to_string(),
            outputs,
        }
    }

    pub fn failed(raw_output: String, error_kind: ErrorKind, message: String) -> Self {
        Self {
            succeeded: false,
            raw_output,
            error_kind,
            message,
            outputs: Outputs::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.succeeded
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub(crate) fn into_outputs(self) -> Outputs {
        self.outputs
    }
}
