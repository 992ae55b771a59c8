//! Retry with capped exponential backoff for `tools/call`.
//!
//! Every failure is retried: at this layer a timeout, a broken pipe and an
//! error response all look the same, and the caller decides how many
//! attempts a call is worth.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Longest wait between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_millis(10_000);

/// Attempt count and base delay for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, clamped to at least 1.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(backoff * 2^(attempt-1), 10s)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// `op` receives the 1-based attempt number. The last error is returned
/// as is.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                debug!(attempt, attempts, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
