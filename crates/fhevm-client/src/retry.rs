//! Retry with exponential backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable as _};
use fhevm_core::RetrySettings;

use crate::engine::EngineError;
use crate::error::ClientError;
use crate::metrics;

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for EngineError {
    fn is_retryable(&self) -> bool {
        true
    }
}

impl Retryable for ClientError {
    fn is_retryable(&self) -> bool {
        ClientError::is_retryable(self)
    }
}

/// Bounded exponential backoff: wait `base_delay * 2^(attempt - 1)` after each
/// failed attempt, give up after `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after `attempt` (1-based) has failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Backoff schedule for this policy, without jitter
    pub fn to_backoff_builder(&self) -> ExponentialBuilder {
        let max_attempts = self.max_attempts.max(1);
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            // cap at the last wait so float scaling never drifts past it
            .with_max_delay(self.delay_for(max_attempts - 1))
            .with_max_times((max_attempts - 1) as usize)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out.
    ///
    /// The returned error is always the one from the last attempt made.
    pub async fn execute<T, E, F, Fut>(&self, op_name: &'static str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        op.retry(self.to_backoff_builder())
            .when(|err: &E| err.is_retryable())
            .notify(|err: &E, delay: Duration| {
                attempt += 1;
                tracing::debug!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    delay = ?delay,
                    "Retrying after failure"
                );
                metrics::record_retry(op_name);
            })
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().into()
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self::new(settings.max_attempts, Duration::from_millis(settings.base_delay_ms))
    }
}
