use std::collections::HashSet;
use std::sync::Arc;

use super::error::InventoryError;
use super::provider::{InventoryProvider, InventoryQuery, InventoryRow};

/// Reads the current photo inventory through an [`InventoryProvider`].
#[derive(Clone)]
pub struct InventoryReader {
    provider: Arc<dyn InventoryProvider>,
}

impl InventoryReader {
    pub fn new(provider: Arc<dyn InventoryProvider>) -> Self {
        Self { provider }
    }

    /// Every photo, newest first by effective timestamp.
    ///
    /// An unavailable inventory is logged and reads as empty.
    pub async fn list_photos(&self) -> Vec<InventoryRow> {
        match self.provider.query(&InventoryQuery::all()).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Inventory unavailable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Ids of every photo currently in the inventory.
    ///
    /// Unlike [`list_photos`](Self::list_photos) this does not degrade to
    /// empty: callers prune decisions based on the result.
    pub async fn list_ids(&self) -> Result<HashSet<i64>, InventoryError> {
        let ids = self.provider.query_ids().await?;
        Ok(ids.into_iter().collect())
    }

    /// Rows for the given ids, newest first. Unknown ids are absent from the
    /// result.
    pub async fn lookup(&self, ids: &[i64]) -> Result<Vec<InventoryRow>, InventoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.provider
            .query(&InventoryQuery::by_ids(ids.iter().copied()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::provider::testing::{row, MemoryInventory};

    fn reader(inventory: Arc<MemoryInventory>) -> InventoryReader {
        InventoryReader::new(inventory)
    }

    #[tokio::test]
    async fn test_list_photos_newest_first() {
        let inventory = Arc::new(MemoryInventory::new(vec![
            row(2, Some(5000), 0),
            row(1, Some(0), 100),
        ]));
        let rows = reader(inventory).list_photos().await;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_list_photos_unavailable_is_empty() {
        let inventory = Arc::new(MemoryInventory::new(vec![row(1, Some(1), 0)]));
        inventory.set_unavailable(true);
        assert!(reader(inventory).list_photos().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_ids_unavailable_is_error() {
        let inventory = Arc::new(MemoryInventory::new(vec![row(1, Some(1), 0)]));
        inventory.set_unavailable(true);
        let result = reader(inventory).list_ids().await;
        assert!(matches!(result, Err(InventoryError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_list_ids() {
        let inventory = Arc::new(MemoryInventory::new(vec![
            row(1, Some(1), 0),
            row(2, Some(2), 0),
        ]));
        let ids = reader(inventory).list_ids().await.unwrap();
        assert_eq!(ids, HashSet::from([1, 2]));
    }

    #[tokio::test]
    async fn test_lookup_empty_skips_query() {
        let inventory = Arc::new(MemoryInventory::new(vec![row(1, Some(1), 0)]));
        let r = reader(inventory.clone());
        assert!(r.lookup(&[]).await.unwrap().is_empty());
        assert_eq!(
            inventory.queries.load(std::sync::atomic::Ordering::SeqCst),
            0
        );

        let rows = r.lookup(&[1, 3]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }
}
