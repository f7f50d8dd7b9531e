//! Types for the decision ledger.

use serde::Serialize;

/// A keep/delete verdict for one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Keep,
    Delete,
}

impl Decision {
    /// Value of the `deleted` column for this decision.
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete)
    }

    /// Convert from the `deleted` column.
    pub fn from_deleted_flag(deleted: bool) -> Self {
        if deleted {
            Self::Delete
        } else {
            Self::Keep
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Delete => "delete",
        }
    }
}

/// One row of the decision ledger.
///
/// `source_path` and `size_bytes` are snapshots taken when the decision was
/// recorded and are never re-validated against the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub source_id: i64,
    pub source_path: String,
    pub size_bytes: u64,
    pub deleted: bool,
}

impl DecisionRecord {
    pub fn new(
        source_id: i64,
        source_path: impl Into<String>,
        size_bytes: u64,
        decision: Decision,
    ) -> Self {
        Self {
            source_id,
            source_path: source_path.into(),
            size_bytes,
            deleted: decision.is_delete(),
        }
    }

    pub fn decision(&self) -> Decision {
        Decision::from_deleted_flag(self.deleted)
    }
}

/// Summary of the current ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    /// Number of outstanding decisions.
    pub total: u64,
    /// Photos marked for deletion but not yet finalized.
    pub deleted: u64,
    /// Photos explicitly kept.
    pub kept: u64,
    /// Sum of the size snapshots of all pending deletions.
    pub pending_delete_bytes: u64,
}
