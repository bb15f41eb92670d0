//! Orderdeck Sync - scheduled marketplace order synchronization.
//!
//! Pulls recent orders from the marketplace SP-API and reconciles them into
//! the `orders` table. Runs once and exits by default; set
//! `SYNC_INTERVAL_SECS` to keep it resident and re-run on a fixed interval.
//!
//! # Architecture
//!
//! - One database transaction per run: commit on success, full rollback on
//!   any fatal error
//! - Local rate limiting against the SP-API published limits
//! - Ctrl+C / SIGTERM cancels between orders and rolls the open run back

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderdeck_sync::config::SyncConfig;
use orderdeck_sync::db::{self, PgOrderStore};
use orderdeck_sync::error::SyncError;
use orderdeck_sync::limiter::RateLimiter;
use orderdeck_sync::marketplace::SpApiClient;
use orderdeck_sync::pipeline::{OrderSync, SyncTotals};
use orderdeck_sync::shipping::HttpShippingResolver;

#[tokio::main]
async fn main() {
    // Load .env in development; deployed environments set real variables.
    dotenvy::dotenv().ok();

    let config = SyncConfig::from_env().expect("Failed to load configuration");

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orderdeck_sync=info,orderdeck_core=info".into());

    // JSON format on the scheduler host for structured log parsing
    let is_structured = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    let json_layer =
        is_structured.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_structured).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let limiter = Arc::new(RateLimiter::new(config.rate, config.burst));
    let marketplace = SpApiClient::new(&config.marketplace, limiter, config.http_timeout)
        .expect("Failed to build marketplace client");
    let shipping = HttpShippingResolver::new(&config.shipping_service_url)
        .expect("Failed to build shipping client");

    // Surface bad credentials before the first transaction is opened.
    if let Err(err) = marketplace.verify_credentials().await {
        let err = SyncError::Credential(err.to_string());
        tracing::error!(error = %err, "credential check failed");
        std::process::exit(1);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let sync = OrderSync::new(
        marketplace,
        shipping,
        config.lookback_days,
        config.page_size,
        cancel.clone(),
    );

    loop {
        match run_once(&sync, &pool).await {
            Ok(totals) => tracing::info!(
                inserted = totals.inserted,
                updated = totals.updated,
                skipped = totals.skipped,
                "run committed"
            ),
            Err(SyncError::Canceled) => {
                tracing::info!("run canceled, rolled back");
                break;
            }
            Err(err) => tracing::error!(error = %err, "run failed, rolled back"),
        }

        if config.interval.is_zero() {
            break;
        }
        tokio::select! {
            () = tokio::time::sleep(config.interval) => {}
            () = cancel.cancelled() => break,
        }
    }
}

/// Execute one sync run inside its own transaction.
async fn run_once<M, S>(
    sync: &OrderSync<M, S>,
    pool: &sqlx::PgPool,
) -> Result<SyncTotals, SyncError>
where
    M: orderdeck_sync::marketplace::MarketplaceApi,
    S: orderdeck_sync::shipping::ShippingApi,
{
    let mut store = PgOrderStore::begin(pool).await?;
    let totals = sync.run(&mut store).await?;
    store.commit().await?;
    Ok(totals)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, canceling sync run");
}
