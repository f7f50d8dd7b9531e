//! Read-only access to the external photo inventory.
//!
//! [`InventoryProvider`] is the contract an inventory store implements;
//! [`MediaStoreDb`] is the SQLite-backed provider used by the CLI and
//! [`InventoryReader`] is the facade the reconciler reads through.

pub mod error;
pub mod media_store;
pub mod provider;
pub mod reader;

pub use error::InventoryError;
pub use media_store::MediaStoreDb;
pub use provider::{
    effective_timestamp, InventoryProvider, InventoryQuery, InventoryRow, SortOrder,
};
pub use reader::InventoryReader;
