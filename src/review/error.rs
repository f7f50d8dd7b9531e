//! Error types for the review-state reconciler.

use thiserror::Error;

use crate::inventory::InventoryError;
use crate::state::LedgerError;

/// Errors from operations that need both the ledger and the inventory.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The inventory could not be read. Nothing was pruned.
    #[error("Inventory unavailable, reconciliation skipped: {0}")]
    InventoryUnavailable(#[from] InventoryError),
}
