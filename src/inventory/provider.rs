//! The inventory provider contract.
//!
//! The photo inventory is owned by something else (a platform media store,
//! a scanner's index). This crate only ever reads it through
//! [`InventoryProvider`], so the reconciler can run against a real store or
//! an in-memory fixture.

use std::cmp::Reverse;
use std::collections::HashSet;

use super::error::InventoryError;

/// One photo as reported by the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRow {
    pub id: i64,
    pub display_name: String,
    /// Seconds since epoch.
    pub date_added: i64,
    /// Milliseconds since epoch. Missing or zero on many imported files.
    pub date_taken: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub size_bytes: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl InventoryRow {
    /// Milliseconds used to order and bucket this photo.
    pub fn effective_timestamp(&self) -> i64 {
        effective_timestamp(self.date_taken, self.date_added)
    }

    /// Whether either date is present. Dates before 1970 are negative and
    /// still count.
    pub fn has_date(&self) -> bool {
        self.date_taken.is_some_and(|t| t != 0) || self.date_added != 0
    }
}

/// `date_taken` when present and non-zero, otherwise `date_added` scaled to
/// milliseconds.
pub fn effective_timestamp(date_taken: Option<i64>, date_added: i64) -> i64 {
    match date_taken {
        Some(taken) if taken != 0 => taken,
        _ => date_added.saturating_mul(1000),
    }
}

/// Row ordering requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first by effective timestamp, ties broken by id descending.
    #[default]
    EffectiveTimestampDesc,
    /// Whatever order the store returns.
    Unordered,
}

impl SortOrder {
    /// Sort rows in memory the way a provider would have returned them.
    pub fn apply(self, rows: &mut [InventoryRow]) {
        match self {
            Self::EffectiveTimestampDesc => {
                rows.sort_by_key(|r| (Reverse(r.effective_timestamp()), Reverse(r.id)));
            }
            Self::Unordered => {}
        }
    }
}

/// Parameters of one inventory query.
#[derive(Debug, Clone, Default)]
pub struct InventoryQuery {
    /// Restrict to these ids. `None` returns every photo.
    pub ids: Option<HashSet<i64>>,
    pub order: SortOrder,
}

impl InventoryQuery {
    /// Every photo, newest first.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the given ids, newest first.
    pub fn by_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            order: SortOrder::EffectiveTimestampDesc,
        }
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn matches(&self, id: i64) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&id))
    }
}

/// Read access to the external photo inventory.
#[async_trait::async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Return the rows selected by `query`, in the requested order.
    async fn query(&self, query: &InventoryQuery) -> Result<Vec<InventoryRow>, InventoryError>;

    /// Return every id currently in the inventory, unordered.
    async fn query_ids(&self) -> Result<Vec<i64>, InventoryError> {
        let rows = self
            .query(&InventoryQuery::all().with_order(SortOrder::Unordered))
            .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::row;
    use super::*;

    #[test]
    fn test_effective_timestamp_prefers_date_taken() {
        assert_eq!(effective_timestamp(Some(5000), 100), 5000);
    }

    #[test]
    fn test_effective_timestamp_falls_back_on_zero_or_missing() {
        assert_eq!(effective_timestamp(Some(0), 1000), 1_000_000);
        assert_eq!(effective_timestamp(None, 1000), 1_000_000);
    }

    #[test]
    fn test_has_date() {
        assert!(row(1, Some(-143_000_000_000), 0).has_date());
        assert!(row(2, None, 100).has_date());
        assert!(!row(3, Some(0), 0).has_date());
        assert!(!row(4, None, 0).has_date());
    }

    #[test]
    fn test_sort_order_newest_first_with_id_tiebreak() {
        let mut rows = vec![
            row(1, Some(0), 100),
            row(2, Some(5000), 0),
            row(3, Some(100_000), 0),
            row(4, None, 200),
        ];
        SortOrder::EffectiveTimestampDesc.apply(&mut rows);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 3, 1, 2]);
    }

    #[test]
    fn test_unordered_keeps_input_order() {
        let mut rows = vec![row(2, Some(1), 0), row(1, Some(2), 0)];
        SortOrder::Unordered.apply(&mut rows);
        assert_eq!(rows[0].id, 2);
    }

    #[test]
    fn test_query_matches() {
        assert!(InventoryQuery::all().matches(42));
        let q = InventoryQuery::by_ids([1, 2]);
        assert!(q.matches(1));
        assert!(!q.matches(3));
    }
}
