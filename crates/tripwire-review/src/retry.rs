use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tripwire_core::{RetryConfig, TripwireError};

/// Bounded retry with exponential backoff for transient host failures.
///
/// # Examples
///
/// ```
/// use tripwire_core::RetryConfig;
/// use tripwire_review::retry::RetryPolicy;
///
/// let policy = RetryPolicy::from(&RetryConfig::default());
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay_before(2).as_millis(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt` (1-based; the first attempt has none).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Only [`TripwireError::TransientNetwork`] is retried. When attempts are
    /// exhausted the last transient error is escalated to
    /// [`TripwireError::FatalNetwork`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, TripwireError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TripwireError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_before(attempt + 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(TripwireError::TransientNetwork(message)) => {
                    return Err(TripwireError::FatalNetwork(format!(
                        "{operation} failed after {attempt} attempts: {message}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}
