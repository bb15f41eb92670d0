//! Token-window rate limiter for outbound marketplace calls.
//!
//! The SP-API throttles per operation; exceeding the published rate earns
//! long 429 penalties, so calls are paced locally instead. The limiter is an
//! explicit value owned by whoever constructs the client - tests build
//! isolated limiters, and the internal mutex keeps it sound if a future
//! design fans out across workers.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Bounds outbound calls to `rate` calls/second sustained and `burst` calls
/// within any trailing 1-second window.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: usize,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter. `rate` is clamped to a small positive floor so the
    /// pacing delay stays finite.
    #[must_use]
    pub fn new(rate: f64, burst: usize) -> Self {
        Self {
            rate: rate.max(0.001),
            burst: burst.max(1),
            window: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until one more call can be issued without exceeding the limits.
    ///
    /// Never fails; only delays. The call is recorded before the pacing
    /// sleep so a burst of concurrent callers still counts every slot.
    pub async fn acquire(&self) {
        let pacing = Duration::from_secs_f64(1.0 / self.rate);

        loop {
            let now = Instant::now();
            let mut window = self.window.lock().await;

            while let Some(oldest) = window.front() {
                if now.duration_since(*oldest) >= Duration::from_secs(1) {
                    window.pop_front();
                } else {
                    break;
                }
            }

            if window.len() >= self.burst {
                // Sleep until the oldest call exits the 1-second window,
                // then re-check: another caller may have taken the slot.
                let oldest = *window.front().unwrap_or(&now);
                drop(window);
                let wake = oldest + Duration::from_secs(1);
                tokio::time::sleep_until(wake).await;
                continue;
            }

            window.push_back(now);
            drop(window);
            tokio::time::sleep(pacing).await;
            return;
        }
    }
}
