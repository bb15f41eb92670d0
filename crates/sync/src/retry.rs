//! Retry policy shared by the HTTP invoker and the fee estimator.
//!
//! Both callers need the same bookkeeping - bounded attempts, a sleep whose
//! shape depends on why the attempt failed - but with different backoff
//! schedules: the general API recovers from a 429 in roughly constant time
//! (flat cooldown), while fee estimation recovers slowly (exponential).

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Shape of the delay applied after a rate-limited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same cooldown after every rate-limited attempt.
    Flat(Duration),
    /// `base * 2^attempt` after the attempt numbered `attempt` (0-based).
    Exponential { base: Duration },
}

impl Backoff {
    /// Delay to sleep after the given 0-based attempt fails rate-limited.
    #[must_use]
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Flat(cooldown) => cooldown,
            Self::Exponential { base } => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                base.saturating_mul(factor)
            }
        }
    }
}

/// Bounded retry policy with a backoff shape and optional jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Sleep applied after rate-limited attempts.
    pub backoff: Backoff,
    /// Fraction of the delay added as random jitter (0.0 disables).
    pub jitter: f64,
}

impl RetryPolicy {
    /// Policy for general marketplace calls: flat 20-second cooldown on 429.
    #[must_use]
    pub const fn flat(attempts: u32, cooldown: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Flat(cooldown),
            jitter: 0.0,
        }
    }

    /// Policy for fee estimation: `2^attempt` seconds, 5 attempts.
    #[must_use]
    pub const fn exponential(attempts: u32, base: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff::Exponential { base },
            jitter: 0.1,
        }
    }

    fn sleep_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff.delay(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }
        let jitter = delay.mul_f64(rand::rng().random_range(0.0..self.jitter));
        delay.saturating_add(jitter)
    }
}

/// How an error classifies for retry purposes.
pub trait RetryClass {
    /// The remote signaled a rate limit (HTTP 429).
    fn is_rate_limited(&self) -> bool;
    /// Transient failure (timeout, connect error, 5xx) worth retrying
    /// without extra cooldown.
    fn is_transient(&self) -> bool;
}

/// Run `op` up to `policy.attempts` times.
///
/// Rate-limited failures sleep the policy's backoff before the next attempt;
/// transient failures retry immediately (the rate limiter already paces
/// calls); anything else propagates at once. On exhaustion the last error is
/// returned.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-retryable error.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    E: RetryClass + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() => {
                let delay = policy.sleep_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limit hit, backing off"
                );
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(err) if err.is_transient() => {
                warn!(
                    operation,
                    attempt = attempt + 1,
                    attempts,
                    error = %err,
                    "transient failure, retrying"
                );
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    // attempts >= 1, so at least one error was recorded
    Err(last_err.map_or_else(|| unreachable!("retry loop ran zero attempts"), |e| e))
}
