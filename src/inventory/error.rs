//! Error types for the inventory reader.

use thiserror::Error;

/// Errors raised while querying the external photo inventory.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// The store could not be opened or queried. Expected to be transient.
    #[error("Photo inventory unavailable: {reason}")]
    Unavailable { reason: String },

    /// Failed to spawn a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),
}

impl InventoryError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for InventoryError {
    fn from(e: rusqlite::Error) -> Self {
        Self::unavailable(e)
    }
}
