//! Unified error handling for the sync pipeline.

use thiserror::Error;

use crate::db::StoreError;
use crate::marketplace::MarketplaceError;

/// Fatal errors that abort a sync run.
///
/// Per-order failures are handled inside the orchestrator's per-order
/// boundary and never surface here; anything that does surface triggers a
/// full rollback of the run's transaction.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Token exchange failed before the run started.
    #[error("credential error: {0}")]
    Credential(String),

    /// The marketplace order feed itself could not be read.
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),

    /// The database is unreachable or the transaction failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The run was canceled by the operator.
    #[error("sync run canceled")]
    Canceled,
}
