//! `PostgreSQL` access for the sync pipeline.

pub mod orders;

pub use orders::{NewOrderRow, OrderStore, PgOrderStore, StoredOrder};

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

/// Errors from the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, transaction or query failure. Fatal to the run.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Constraint violation on one row. Skippable at the order boundary.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A stored value did not parse into its domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl StoreError {
    /// Whether the error poisons the whole run (as opposed to one order).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Classify a query error, pulling constraint violations out of the
    /// generic database bucket so the per-order boundary can skip them.
    pub(crate) fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                Self::Constraint(db.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Create a connection pool sized for the sync workload.
///
/// # Errors
///
/// Returns `sqlx::Error` if the database is unreachable.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
