//! Login-with-Amazon token exchange with in-process caching.
//!
//! Access tokens live 30 minutes; the provider caches the current one and
//! refreshes it shortly before expiry so a long sync run never carries a
//! stale token across a page boundary.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::config::MarketplaceConfig;
use crate::marketplace::MarketplaceError;

/// Fallback lifetime when the token response omits `expires_in`.
const TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Refresh this long before the cached token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Exchanges the long-lived refresh token for short-lived access tokens.
#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    config: MarketplaceConfig,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, config: MarketplaceConfig) -> Self {
        Self {
            http,
            config,
            cached: RwLock::new(None),
        }
    }

    /// Current access token, refreshed if the cached one is near expiry.
    ///
    /// # Errors
    ///
    /// `MarketplaceError::Auth` when the token endpoint rejects the
    /// exchange or returns an unparseable response.
    pub async fn access_token(&self) -> Result<String, MarketplaceError> {
        if let Some(token) = self.cached.read().await.as_ref()
            && token.is_fresh()
        {
            return Ok(token.access_token.clone());
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.access_token.clone());
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<CachedToken, MarketplaceError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.config.refresh_token.expose_secret()),
            ("client_id", &self.config.client_id),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| MarketplaceError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketplaceError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MarketplaceError::Auth(e.to_string()))?;

        let lifetime = token
            .expires_in
            .map_or(TOKEN_LIFETIME, Duration::from_secs)
            .min(TOKEN_LIFETIME);
        debug!(lifetime_secs = lifetime.as_secs(), "access token refreshed");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
