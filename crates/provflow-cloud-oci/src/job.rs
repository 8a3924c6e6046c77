//! Resource Manager job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Accepted,
    InProgress,
    Failed,
    Succeeded,
    Canceling,
    Canceled,
    /// A state this client does not know; treated as still running
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Canceled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Accepted => write!(f, "ACCEPTED"),
            JobState::InProgress => write!(f, "IN_PROGRESS"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Canceling => write!(f, "CANCELING"),
            JobState::Canceled => write!(f, "CANCELED"),
            JobState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One apply job. Never reused across attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningJob {
    pub id: String,

    #[serde(rename = "lifecycleState")]
    pub state: JobState,

    #[serde(rename = "timeCreated")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub failure_details: Option<FailureDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetails {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FailureDetails {
    /// `code: message`, or whichever half is present
    pub fn summary(&self) -> Option<String> {
        match (self.code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        }
    }
}

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// One entry of a job's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Raw level string; unknown levels are kept rather than rejected
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub message: String,
}

impl LogEntry {
    pub fn level(&self) -> Option<LogLevel> {
        self.level.as_deref().and_then(|l| l.parse().ok())
    }

    /// Entries that explain a failure
    ///
    /// terraform reports errors at INFO level inside the job log, so the
    /// message is checked as well as the level.
    pub fn is_diagnostic(&self) -> bool {
        self.level().is_some_and(|l| l >= LogLevel::Error) || self.message.contains("Error:")
    }
}

/// One output of a succeeded job
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub output_name: String,
    #[serde(default)]
    pub output_value: Option<serde_json::Value>,
    #[serde(default)]
    pub is_sensitive: bool,
}
