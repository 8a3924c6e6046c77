//! Session events for operator-facing output

use crate::attempt::{ErrorKind, Outputs};
use std::time::Duration;

/// What the controller does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    RetryAfter(Duration),
    FatalStop,
}

impl std::fmt::Display for NextAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextAction::RetryAfter(delay) => write!(f, "retry in {}s", delay.as_secs()),
            NextAction::FatalStop => write!(f, "stop"),
        }
    }
}

/// One observable step of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AttemptStarted {
        attempt: u64,
        backend: String,
    },
    AttemptFailed {
        attempt: u64,
        kind: ErrorKind,
        message: String,
        next: NextAction,
        /// Unknown failures in a row, including this one
        unknown_streak: u32,
    },
    Succeeded {
        attempt: u64,
        outputs: Outputs,
    },
    Canceled {
        attempts: u64,
    },
}

/// Receives session events as they happen
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Observer that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&self, _event: &SessionEvent) {}
}
