//! Provisioning back-end trait definition

use crate::attempt::RawAttempt;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Default wait between attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Provisioning back-end abstraction
///
/// Both back-ends (the terraform CLI and the managed job API) implement this
/// trait so a single retry controller can drive either of them. A back-end
/// performs exactly one apply per call and never retries on its own.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Returns the back-end name (e.g., "terraform", "resource-manager")
    fn name(&self) -> &str;

    /// One-time checks before the first attempt
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Run one apply and report its raw, unclassified outcome
    async fn apply(&self) -> Result<RawAttempt>;
}

#[async_trait]
impl<T: ProvisioningBackend + ?Sized> ProvisioningBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn prepare(&self) -> Result<()> {
        (**self).prepare().await
    }

    async fn apply(&self) -> Result<RawAttempt> {
        (**self).apply().await
    }
}

/// Retry configuration for the controller
///
/// There is no attempt cap: retryable failures are retried
/// until the session succeeds, hits a fatal error, or is canceled.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between a retryable failure and the next attempt
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}
