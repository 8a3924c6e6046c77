//! ProvFlow provisioning core
//!
//! This crate holds the provider-independent half of ProvFlow: the retry
//! controller that keeps applying an infrastructure configuration until the
//! instance exists, and the classifier that decides whether a failure is
//! worth retrying.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ProvFlow CLI                    │
//! │                (provflow apply)                  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               provflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            RetryController                │   │
//! │  │  trait ProvisioningBackend { apply() }    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Classifier  │  │   Session    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼────────┐
//! │   terraform   │ │ resource mgr   │
//! │  (subprocess) │ │  (job API)     │
//! └───────────────┘ └────────────────┘
//! ```

pub mod attempt;
pub mod classifier;
pub mod connection;
pub mod controller;
pub mod error;
pub mod event;
pub mod provider;
pub mod session;

// Re-exports
pub use attempt::{AttemptResult, ErrorKind, Outputs, RawAttempt};
pub use classifier::{Classification, ErrorClassifier, classify};
pub use connection::{ConnectionInfo, ConnectionSettings, display_value};
pub use controller::{FatalReason, RetryController, TerminalOutcome};
pub use error::{CloudError, Result};
pub use event::{NextAction, NoopObserver, SessionEvent, SessionObserver};
pub use provider::{DEFAULT_RETRY_INTERVAL, ProvisioningBackend, RetryPolicy};
pub use session::{AttemptSummary, RetrySession, SessionState};
pub use tokio_util::sync::CancellationToken;
