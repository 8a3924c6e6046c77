//! Provisioning retry controller
//!
//! Drives the attempt loop over a single [`ProvisioningBackend`]:
//!
//! ```text
//! IDLE -> ATTEMPTING -> SUCCEEDED
//!                    -> FATAL
//!                    -> WAITING -> ATTEMPTING -> ...
//! ```
//!
//! Exactly one apply is in flight at any time. Cancellation is honoured
//! before an attempt starts and during the wait between attempts, never
//! while an apply is running.

use crate::attempt::{AttemptResult, ErrorKind, Outputs};
use crate::classifier::{ErrorClassifier, one_line};
use crate::error::Result;
use crate::event::{NextAction, NoopObserver, SessionEvent, SessionObserver};
use crate::provider::{ProvisioningBackend, RetryPolicy};
use crate::session::{RetrySession, SessionState};
use tokio_util::sync::CancellationToken;

/// Why a session ended without success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// The last attempt failed with a fatal error kind
    Classified { kind: ErrorKind, message: String },
    /// An external interrupt stopped the session
    Canceled,
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalReason::Classified { kind, message } => write!(f, "{}: {}", kind, message),
            FatalReason::Canceled => write!(f, "canceled"),
        }
    }
}

/// Final result of [`RetryController::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    Succeeded { attempts: u64, outputs: Outputs },
    Fatal(FatalReason),
}

impl TerminalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Succeeded { .. })
    }
}

/// Retry controller for one provisioning session
pub struct RetryController<B> {
    backend: B,
    classifier: ErrorClassifier,
    policy: RetryPolicy,
    cancel: CancellationToken,
    observer: Box<dyn SessionObserver>,
    session: RetrySession,
    outcome: Option<TerminalOutcome>,
}

impl<B: ProvisioningBackend> RetryController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            classifier: ErrorClassifier::new(),
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            observer: Box::new(NoopObserver),
            session: RetrySession::new(),
            outcome: None,
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Token that cancels this session when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn session(&self) -> &RetrySession {
        &self.session
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the back-end's one-time checks
    pub async fn prepare(&self) -> Result<()> {
        tracing::info!(backend = self.backend.name(), "preparing back-end");
        self.backend.prepare().await
    }

    /// Run attempts until success, a fatal error, or cancellation
    ///
    /// Calling this again after the session has ended returns the same
    /// outcome without touching the back-end.
    pub async fn run(&mut self) -> TerminalOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        loop {
            if self.cancel.is_cancelled() {
                return self.finish_canceled();
            }

            let attempt = self.session.begin_attempt();
            tracing::info!(attempt, backend = self.backend.name(), "starting apply attempt");
            self.observer.on_event(&SessionEvent::AttemptStarted {
                attempt,
                backend: self.backend.name().to_string(),
            });

            let result = self.attempt().await;
            self.session.record(&result);

            if result.is_success() {
                tracing::info!(attempt, "apply succeeded");
                let outputs = result.into_outputs();
                self.observer.on_event(&SessionEvent::Succeeded {
                    attempt,
                    outputs: outputs.clone(),
                });
                return self.finish(
                    SessionState::Succeeded,
                    TerminalOutcome::Succeeded {
                        attempts: self.session.attempt_count(),
                        outputs,
                    },
                );
            }

            let kind = result.error_kind();
            let message = result.message().to_string();
            let unknown_streak = self.session.consecutive_unknown();

            if kind.is_fatal() {
                tracing::error!(attempt, kind = %kind, message = %message, "fatal error, stopping");
                self.observer.on_event(&SessionEvent::AttemptFailed {
                    attempt,
                    kind,
                    message: message.clone(),
                    next: NextAction::FatalStop,
                    unknown_streak,
                });
                return self.finish(
                    SessionState::Fatal,
                    TerminalOutcome::Fatal(FatalReason::Classified { kind, message }),
                );
            }

            let interval = self.policy.interval;
            if kind == ErrorKind::Unknown {
                tracing::warn!(
                    attempt,
                    unknown_streak,
                    message = %message,
                    "unrecognized failure, retrying anyway; repeated occurrences may mean a broken configuration"
                );
            } else {
                tracing::info!(
                    attempt,
                    kind = %kind,
                    message = %message,
                    retry_in_secs = interval.as_secs(),
                    "retryable failure"
                );
            }
            self.observer.on_event(&SessionEvent::AttemptFailed {
                attempt,
                kind,
                message,
                next: NextAction::RetryAfter(interval),
                unknown_streak,
            });

            self.session.wait();
            let cancel = self.cancel.clone();
            let canceled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(interval) => false,
            };
            if canceled {
                return self.finish_canceled();
            }
        }
    }

    /// One apply, classified. Back-end faults become `unknown` failures.
    async fn attempt(&self) -> AttemptResult {
        match self.backend.apply().await {
            Ok(raw) if raw.succeeded => AttemptResult::succeeded(raw.raw_output, raw.outputs),
            Ok(raw) => {
                let classification = self.classifier.classify(&raw.raw_output);
                AttemptResult::failed(raw.raw_output, classification.kind, classification.message)
            }
            Err(e) => {
                let text = e.to_string();
                tracing::warn!(backend = self.backend.name(), error = %text, "back-end fault");
                let message = one_line(
                    &format!("{} back-end error: {}", self.backend.name(), text),
                    "back-end error",
                );
                AttemptResult::failed(text, ErrorKind::Unknown, message)
            }
        }
    }

    fn finish_canceled(&mut self) -> TerminalOutcome {
        let attempts = self.session.attempt_count();
        tracing::warn!(attempts, "session canceled");
        self.observer.on_event(&SessionEvent::Canceled { attempts });
        self.finish(
            SessionState::Fatal,
            TerminalOutcome::Fatal(FatalReason::Canceled),
        )
    }

    fn finish(&mut self, state: SessionState, outcome: TerminalOutcome) -> TerminalOutcome {
        self.session.terminate(state);
        self.outcome = Some(outcome.clone());
        outcome
    }
}
