//! Rate-limited, retrying HTTP invoker for marketplace calls.
//!
//! Every attempt - including retries - passes through the rate limiter
//! first, and every attempt's HTTP status is logged; the status log is how
//! throttling gets diagnosed in production.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::limiter::RateLimiter;
use crate::marketplace::MarketplaceError;
use crate::retry::{RetryPolicy, with_retry};

/// Flat cooldown after a 429 on general marketplace calls. Burst recovery is
/// roughly constant-time, so the wait does not grow across attempts.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(20);

/// Default attempt budget for general marketplace calls.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Wraps a single HTTP call with rate limiting and a bounded retry policy.
#[derive(Debug, Clone)]
pub struct ResilientInvoker {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ResilientInvoker {
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self { limiter, policy }
    }

    /// Invoker with the flat-cooldown policy used for order-feed calls.
    #[must_use]
    pub fn with_default_policy(limiter: Arc<RateLimiter>) -> Self {
        Self::new(
            limiter,
            RetryPolicy::flat(DEFAULT_ATTEMPTS, RATE_LIMIT_COOLDOWN),
        )
    }

    /// Issue the request, retrying per the invoker's policy.
    ///
    /// `build` is called once per attempt so request bodies never need to be
    /// cloned across retries.
    ///
    /// # Errors
    ///
    /// `MarketplaceError::RateLimitExceeded` when every attempt came back
    /// 429; otherwise the last failure (`Api` for HTTP errors, `Transport`
    /// for connection problems).
    pub async fn invoke<F>(
        &self,
        operation: &str,
        build: F,
    ) -> Result<reqwest::Response, MarketplaceError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let result = with_retry(self.policy, operation, || {
            self.attempt(operation, build())
        })
        .await;

        match result {
            Err(MarketplaceError::RateLimited) => Err(MarketplaceError::RateLimitExceeded),
            other => other,
        }
    }

    /// Issue the request exactly once through the rate limiter.
    ///
    /// Used by callers that own their retry schedule (the fee estimator's
    /// exponential backoff).
    ///
    /// # Errors
    ///
    /// `MarketplaceError::RateLimited` on 429, `Api` on other HTTP errors,
    /// `Transport` on connection problems.
    pub async fn invoke_once(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, MarketplaceError> {
        self.attempt(operation, request).await
    }

    async fn attempt(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, MarketplaceError> {
        self.limiter.acquire().await;

        let response = request.send().await?;
        let status = response.status();
        info!(operation, status = status.as_u16(), "marketplace API response");

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketplaceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketplaceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}
