//! Merges the inventory with recorded decisions and prunes stale decisions.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::inventory::InventoryReader;
use crate::state::{Decision, DecisionLedger, LedgerError};

use super::error::ReconcileError;
use super::grouping::{build_albums, partition_decided_first, review_state_for};
use super::types::{Album, AlbumKey, PhotoRecord, ReviewState};

/// Outcome of one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Decisions present in the ledger when the pass started.
    pub examined: usize,
    /// Decisions whose photo is no longer in the inventory.
    pub stale: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Builds month albums from the inventory and the decision ledger, and keeps
/// the ledger in step with the inventory.
///
/// The last loaded album list is cached. Mutations update the cache only
/// after the ledger write succeeds.
pub struct Reconciler {
    ledger: Arc<dyn DecisionLedger>,
    inventory: InventoryReader,
    albums: RwLock<Vec<Album>>,
}

impl Reconciler {
    pub fn new(ledger: Arc<dyn DecisionLedger>, inventory: InventoryReader) -> Self {
        Self {
            ledger,
            inventory,
            albums: RwLock::new(Vec::new()),
        }
    }

    fn albums_read(&self) -> RwLockReadGuard<'_, Vec<Album>> {
        self.albums.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn albums_write(&self) -> RwLockWriteGuard<'_, Vec<Album>> {
        self.albums.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the album list from the current inventory and ledger.
    ///
    /// An unavailable inventory yields no albums. Ledger failures propagate
    /// and leave the previous cache in place.
    pub async fn load_albums(&self) -> Result<Vec<Album>, LedgerError> {
        let deleted = self.ledger.get_deleted_ids().await?;
        let kept = self.ledger.get_kept_ids().await?;
        let rows = self.inventory.list_photos().await;
        let row_count = rows.len();

        let photos = rows.into_iter().filter_map(|row| {
            if !row.has_date() {
                tracing::warn!(
                    id = row.id,
                    path = %row.path,
                    "Photo has no usable date, skipping"
                );
                return None;
            }
            let state = review_state_for(row.id, &deleted, &kept);
            Some(PhotoRecord::from_row(row, state))
        });
        let albums = build_albums(photos);

        tracing::info!(
            photos = row_count,
            albums = albums.len(),
            deleted = deleted.len(),
            kept = kept.len(),
            "Loaded albums"
        );

        *self.albums_write() = albums.clone();
        Ok(albums)
    }

    /// Albums from the last load.
    pub fn get_albums(&self) -> Vec<Album> {
        self.albums_read().clone()
    }

    pub fn find_album(&self, key: &AlbumKey) -> Option<Album> {
        self.albums_read().iter().find(|a| a.key == *key).cloned()
    }

    pub fn find_photo(&self, id: i64) -> Option<PhotoRecord> {
        self.albums_read().iter().find_map(|a| a.photo(id)).cloned()
    }

    /// Records for `ids`, from the cache when loaded, otherwise looked up in
    /// the inventory and overlaid with the ledger. Unknown ids are skipped.
    pub async fn resolve_photos(&self, ids: &[i64]) -> Result<Vec<PhotoRecord>, ReconcileError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for &id in ids {
            match self.find_photo(id) {
                Some(photo) => found.push(photo),
                None => missing.push(id),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        let rows = self.inventory.lookup(&missing).await?;
        let deleted = self.ledger.get_deleted_ids().await?;
        let kept = self.ledger.get_kept_ids().await?;
        found.extend(rows.into_iter().map(|row| {
            let state = review_state_for(row.id, &deleted, &kept);
            PhotoRecord::from_row(row, state)
        }));
        Ok(found)
    }

    fn set_cached_state(&self, ids: &HashSet<i64>, state: ReviewState) {
        let mut albums = self.albums_write();
        for album in albums.iter_mut() {
            let mut changed = false;
            for photo in album.photos.iter_mut().filter(|p| ids.contains(&p.id)) {
                photo.review_state = state;
                changed = true;
            }
            if changed {
                partition_decided_first(&mut album.photos);
            }
        }
    }

    fn drop_cached(&self, ids: &HashSet<i64>) {
        let mut albums = self.albums_write();
        for album in albums.iter_mut() {
            album.photos.retain(|p| !ids.contains(&p.id));
        }
        albums.retain(|a| !a.photos.is_empty());
    }

    async fn record(&self, photo: &PhotoRecord, decision: Decision) -> Result<(), LedgerError> {
        self.ledger.record(&photo.to_decision(decision)).await?;
        self.set_cached_state(&HashSet::from([photo.id]), decision.into());
        tracing::debug!(id = photo.id, decision = decision.as_str(), "Recorded decision");
        Ok(())
    }

    /// Mark a photo for deletion, replacing any earlier decision.
    pub async fn mark_deleted(&self, photo: &PhotoRecord) -> Result<(), LedgerError> {
        self.record(photo, Decision::Delete).await
    }

    /// Mark a photo as kept, replacing any earlier decision.
    pub async fn mark_kept(&self, photo: &PhotoRecord) -> Result<(), LedgerError> {
        self.record(photo, Decision::Keep).await
    }

    /// Forget a photo's decision once its file has been physically deleted.
    pub async fn finalize_deleted(&self, photo: &PhotoRecord) -> Result<bool, LedgerError> {
        let removed = self.ledger.remove_decision(photo.id).await?;
        self.drop_cached(&HashSet::from([photo.id]));
        Ok(removed)
    }

    /// Batch form of [`finalize_deleted`](Self::finalize_deleted), by id so
    /// photos already gone from the inventory can still be finalized.
    ///
    /// Only delete decisions are removed; other ids are skipped. Returns the
    /// bytes freed according to the size snapshots in the ledger.
    pub async fn finalize_deleted_batch(&self, source_ids: &[i64]) -> Result<u64, LedgerError> {
        let removed = self.ledger.remove_deleted_decisions(source_ids).await?;
        let ids: HashSet<i64> = removed.iter().map(|r| r.source_id).collect();
        for &id in source_ids.iter().filter(|id| !ids.contains(id)) {
            tracing::debug!(id, "No delete decision to finalize");
        }

        let freed = removed
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.size_bytes));
        self.drop_cached(&ids);
        tracing::info!(
            removed = removed.len(),
            freed_bytes = freed,
            "Finalized deletions"
        );
        Ok(freed)
    }

    /// Turn a delete decision back into a keep. Returns whether the photo was
    /// marked for deletion.
    pub async fn reverse_delete_decision(&self, source_id: i64) -> Result<bool, LedgerError> {
        let flipped = self.ledger.flip_to_keep(source_id).await?;
        if flipped {
            self.set_cached_state(&HashSet::from([source_id]), ReviewState::Kept);
        }
        Ok(flipped)
    }

    /// Batch form of [`reverse_delete_decision`](Self::reverse_delete_decision).
    pub async fn reverse_delete_batch(&self, source_ids: &[i64]) -> Result<u64, LedgerError> {
        let flipped = self.ledger.flip_to_keep_batch(source_ids).await?;
        let deleted: HashSet<i64> = {
            let albums = self.albums_read();
            albums
                .iter()
                .flat_map(|a| a.deleted_photos())
                .map(|p| p.id)
                .filter(|id| source_ids.contains(id))
                .collect()
        };
        self.set_cached_state(&deleted, ReviewState::Kept);
        Ok(flipped)
    }

    /// Forget every decision in a loaded album so it can be reviewed again.
    /// Returns the number of decisions removed.
    pub async fn reset_album(&self, key: &AlbumKey) -> Result<u64, LedgerError> {
        let Some(album) = self.find_album(key) else {
            tracing::debug!(album = %key, "Album not loaded, nothing to reset");
            return Ok(0);
        };
        let ids: Vec<i64> = album
            .photos
            .iter()
            .filter(|p| p.review_state.is_decided())
            .map(|p| p.id)
            .collect();
        let removed = self.ledger.remove_decisions(&ids).await?;

        let mut albums = self.albums_write();
        if let Some(cached) = albums.iter_mut().find(|a| a.key == *key) {
            for photo in cached.photos.iter_mut() {
                photo.review_state = ReviewState::Undecided;
            }
            cached
                .photos
                .sort_by_key(|p| (Reverse(p.effective_timestamp), Reverse(p.id)));
        }
        tracing::info!(album = %key, removed, "Reset album");
        Ok(removed)
    }

    /// Remove decisions whose photo is no longer in the inventory.
    ///
    /// Aborts without touching the ledger when the inventory can't be read.
    /// A failure to remove one decision is logged and the pass continues.
    pub async fn reconcile(&self) -> Result<ReconcileStats, ReconcileError> {
        let mut operation_ids = self.ledger.get_deleted_ids().await?;
        operation_ids.extend(self.ledger.get_kept_ids().await?);

        let live_ids = self.inventory.list_ids().await.map_err(|e| {
            tracing::warn!(error = %e, "Skipping reconciliation");
            e
        })?;

        let stale: Vec<i64> = operation_ids
            .iter()
            .copied()
            .filter(|id| !live_ids.contains(id))
            .collect();

        let mut stats = ReconcileStats {
            examined: operation_ids.len(),
            stale: stale.len(),
            ..Default::default()
        };

        for id in stale {
            match self.ledger.remove_decision(id).await {
                Ok(true) => stats.removed += 1,
                Ok(false) => tracing::debug!(id, "Stale decision already removed"),
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(id, error = %e, "Failed to remove stale decision");
                }
            }
        }

        if stats.stale > 0 {
            tracing::info!(
                examined = stats.examined,
                removed = stats.removed,
                failed = stats.failed,
                "Pruned stale decisions"
            );
        } else {
            tracing::debug!(examined = stats.examined, "No stale decisions");
        }
        Ok(stats)
    }
}
