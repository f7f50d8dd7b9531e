//! Persistent review state.
//!
//! This module provides SQLite-based storage for keep/delete decisions and
//! the small preferences table used by the surrounding features:
//! - Identity-keyed decision ledger with upsert-by-identity writes
//! - Set-based bulk reads for overlaying decisions onto the inventory
//! - Namespaced key-value preferences (cleaned-size counter, sort order)

pub mod db;
pub mod error;
pub mod prefs;
pub mod schema;
pub mod types;

pub use db::{DecisionLedger, SqliteStateDb};
pub use error::LedgerError;
pub use prefs::Preferences;
pub use types::{Decision, DecisionRecord, LedgerSummary};
