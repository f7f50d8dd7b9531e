//! Review-state reconciliation.
//!
//! Combines the inventory with the decision ledger into per-photo review
//! records, groups them into calendar-month albums and prunes decisions for
//! photos that left the inventory.

pub mod error;
pub mod grouping;
pub mod reconciler;
pub mod types;

pub use error::ReconcileError;
pub use grouping::sort_albums;
pub use reconciler::{ReconcileStats, Reconciler};
pub use types::{Album, AlbumKey, AlbumSummary, PhotoRecord, ReviewState};
