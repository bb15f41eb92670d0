//! Sync service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `LWA_CLIENT_ID` - Login-with-Amazon OAuth client ID
//! - `LWA_CLIENT_SECRET` - Login-with-Amazon OAuth client secret
//! - `LWA_REFRESH_TOKEN` - Long-lived refresh token for the seller account
//! - `MARKETPLACE_ID` - Marketplace to pull orders for (e.g. ATVPDKIKX0DER)
//! - `SHIPPING_SERVICE_URL` - Base URL of the internal pricing service
//!
//! ## Optional
//! - `SP_API_ENDPOINT` - SP-API base URL (default: NA endpoint)
//! - `LWA_TOKEN_URL` - Token exchange endpoint (default: api.amazon.com)
//! - `SYNC_LOOKBACK_DAYS` - Order window in days (default: 2)
//! - `SYNC_PAGE_SIZE` - Orders per page (default: 100)
//! - `SYNC_RATE` - Sustained marketplace calls per second (default: 1.0)
//! - `SYNC_BURST` - Max calls in any trailing second (default: 10)
//! - `SYNC_INTERVAL_SECS` - Seconds between runs; 0 runs once and exits
//! - `HTTP_TIMEOUT_SECS` - Per-call timeout for marketplace requests (default: 30)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_SP_API_ENDPOINT: &str = "https://sellingpartnerapi-na.amazon.com";
const DEFAULT_LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Top-level sync service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Marketplace API configuration
    pub marketplace: MarketplaceConfig,
    /// Base URL of the internal shipping-cost service
    pub shipping_service_url: String,
    /// How far back the order window starts, in days
    pub lookback_days: i64,
    /// Orders requested per page
    pub page_size: u32,
    /// Sustained marketplace calls per second
    pub rate: f64,
    /// Maximum calls within any trailing 1-second window
    pub burst: usize,
    /// Seconds between scheduled runs; zero means run once and exit
    pub interval: Duration,
    /// Per-call HTTP timeout for marketplace requests
    pub http_timeout: Duration,
}

/// Marketplace SP-API configuration.
///
/// Implements `Debug` manually to redact the LWA credentials.
#[derive(Clone)]
pub struct MarketplaceConfig {
    /// SP-API base URL
    pub endpoint: String,
    /// LWA token exchange endpoint
    pub token_url: String,
    /// Marketplace identifier orders are pulled for
    pub marketplace_id: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Long-lived refresh token
    pub refresh_token: SecretString,
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("endpoint", &self.endpoint)
            .field("token_url", &self.token_url)
            .field("marketplace_id", &self.marketplace_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = SecretString::from(require("DATABASE_URL")?);

        let marketplace = MarketplaceConfig {
            endpoint: optional("SP_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_SP_API_ENDPOINT.to_string()),
            token_url: optional("LWA_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_LWA_TOKEN_URL.to_string()),
            marketplace_id: require("MARKETPLACE_ID")?,
            client_id: require("LWA_CLIENT_ID")?,
            client_secret: SecretString::from(require("LWA_CLIENT_SECRET")?),
            refresh_token: SecretString::from(require("LWA_REFRESH_TOKEN")?),
        };

        Ok(Self {
            database_url,
            marketplace,
            shipping_service_url: require("SHIPPING_SERVICE_URL")?,
            lookback_days: parse_or("SYNC_LOOKBACK_DAYS", 2)?,
            page_size: parse_or("SYNC_PAGE_SIZE", 100)?,
            rate: parse_or("SYNC_RATE", 1.0)?,
            burst: parse_or("SYNC_BURST", 10)?,
            interval: Duration::from_secs(parse_or("SYNC_INTERVAL_SECS", 0)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
    }
}
