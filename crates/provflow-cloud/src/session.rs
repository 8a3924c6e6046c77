//! Run-level session state
//!
//! A [`RetrySession`] counts attempts and keeps a bounded run log of
//! per-attempt summaries. Only the retry controller mutates it.

use crate::attempt::{AttemptResult, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Run log entries kept in memory
pub const MAX_HISTORY: usize = 500;

/// Controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Attempting,
    Waiting,
    Succeeded,
    Fatal,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Fatal)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Attempting => write!(f, "attempting"),
            SessionState::Waiting => write!(f, "waiting"),
            SessionState::Succeeded => write!(f, "succeeded"),
            SessionState::Fatal => write!(f, "fatal"),
        }
    }
}

/// Summary of one completed attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt: u64,
    pub succeeded: bool,
    pub error_kind: ErrorKind,
    pub message: String,
    pub finished_at: DateTime<Utc>,
}

/// State of one provisioning session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySession {
    attempt_count: u64,
    last_error: ErrorKind,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    state: SessionState,
    consecutive_unknown: u32,
    history: VecDeque<AttemptSummary>,
}

impl Default for RetrySession {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrySession {
    pub fn new() -> Self {
        Self {
            attempt_count: 0,
            last_error: ErrorKind::None,
            started_at: Utc::now(),
            finished_at: None,
            state: SessionState::Idle,
            consecutive_unknown: 0,
            history: VecDeque::new(),
        }
    }

    /// Completed attempts so far
    pub fn attempt_count(&self) -> u64 {
        self.attempt_count
    }

    pub fn last_error(&self) -> ErrorKind {
        self.last_error
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Unknown failures in a row, reset by any other outcome
    pub fn consecutive_unknown(&self) -> u32 {
        self.consecutive_unknown
    }

    pub fn history(&self) -> impl Iterator<Item = &AttemptSummary> {
        self.history.iter()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// Enter ATTEMPTING and return the number the new attempt will carry
    pub(crate) fn begin_attempt(&mut self) -> u64 {
        debug_assert!(!self.is_terminated());
        self.state = SessionState::Attempting;
        self.attempt_count + 1
    }

    /// Record a completed attempt
    pub(crate) fn record(&mut self, result: &AttemptResult) {
        self.attempt_count += 1;
        self.last_error = result.error_kind();

        if result.error_kind() == ErrorKind::Unknown {
            self.consecutive_unknown += 1;
        } else {
            self.consecutive_unknown = 0;
        }

        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(AttemptSummary {
            attempt: self.attempt_count,
            succeeded: result.is_success(),
            error_kind: result.error_kind(),
            message: result.message().to_string(),
            finished_at: Utc::now(),
        });
    }

    pub(crate) fn wait(&mut self) {
        debug_assert!(!self.is_terminated());
        self.state = SessionState::Waiting;
    }

    /// Move to a terminal state; returns false if the session had already ended
    pub(crate) fn terminate(&mut self, state: SessionState) -> bool {
        debug_assert!(state.is_terminal());
        if self.is_terminated() {
            return false;
        }
        self.state = state;
        self.finished_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::Outputs;

    fn failure(kind: ErrorKind) -> AttemptResult {
        AttemptResult::failed(String::new(), kind, kind.to_string())
    }

    #[test]
    fn test_record_increments_once_per_attempt() {
        let mut session = RetrySession::new();
        assert_eq!(session.begin_attempt(), 1);
        session.record(&failure(ErrorKind::CapacityExhausted));
        assert_eq!(session.attempt_count(), 1);
        assert_eq!(session.last_error(), ErrorKind::CapacityExhausted);

        assert_eq!(session.begin_attempt(), 2);
        session.record(&AttemptResult::succeeded(String::new(), Outputs::new()));
        assert_eq!(session.attempt_count(), 2);
        assert_eq!(session.last_error(), ErrorKind::None);
        assert_eq!(session.history().count(), 2);
    }

    #[test]
    fn test_consecutive_unknown_streak() {
        let mut session = RetrySession::new();
        session.record(&failure(ErrorKind::Unknown));
        session.record(&failure(ErrorKind::Unknown));
        assert_eq!(session.consecutive_unknown(), 2);

        session.record(&failure(ErrorKind::CapacityExhausted));
        assert_eq!(session.consecutive_unknown(), 0);
    }

    #[test]
    fn test_terminates_exactly_once() {
        let mut session = RetrySession::new();
        assert!(session.terminate(SessionState::Succeeded));
        assert!(!session.terminate(SessionState::Fatal));
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(session.finished_at().is_some());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = RetrySession::new();
        for _ in 0..(MAX_HISTORY + 10) {
            session.record(&failure(ErrorKind::CapacityExhausted));
        }
        assert_eq!(session.attempt_count(), (MAX_HISTORY + 10) as u64);
        assert_eq!(session.history().count(), MAX_HISTORY);
        assert_eq!(session.history().next().map(|s| s.attempt), Some(11));
    }

    #[test]
    fn test_session_serializes() {
        let mut session = RetrySession::new();
        session.record(&failure(ErrorKind::Unknown));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["attempt_count"], 1);
        assert_eq!(json["last_error"], "unknown");
        assert_eq!(json["state"], "idle");
    }
}
