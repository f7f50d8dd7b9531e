//! Month bucketing and album ordering.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::types::AlbumSortOrder;

use super::types::{Album, AlbumKey, PhotoRecord, ReviewState};

/// Review state of `id` given the two decision sets. A torn read can put
/// an id in both; kept wins.
pub fn review_state_for(id: i64, deleted: &HashSet<i64>, kept: &HashSet<i64>) -> ReviewState {
    if kept.contains(&id) {
        ReviewState::Kept
    } else if deleted.contains(&id) {
        ReviewState::Deleted
    } else {
        ReviewState::Undecided
    }
}

/// Group photos into month albums.
///
/// Albums appear in the order their first photo is encountered, so newest
/// first input yields newest first albums. Inside each album decided photos
/// are moved ahead of undecided ones without otherwise reordering.
pub fn build_albums(photos: impl IntoIterator<Item = PhotoRecord>) -> Vec<Album> {
    let mut albums: Vec<Album> = Vec::new();
    let mut index: HashMap<AlbumKey, usize> = HashMap::new();

    for photo in photos {
        let Some(key) = AlbumKey::from_timestamp_millis(photo.effective_timestamp) else {
            tracing::warn!(
                id = photo.id,
                timestamp = photo.effective_timestamp,
                "Timestamp out of range, skipping photo"
            );
            continue;
        };
        let slot = *index.entry(key).or_insert_with(|| {
            albums.push(Album::new(key));
            albums.len() - 1
        });
        albums[slot].photos.push(photo);
    }

    for album in &mut albums {
        partition_decided_first(&mut album.photos);
    }
    albums
}

/// Stable partition: decided photos first.
pub fn partition_decided_first(photos: &mut [PhotoRecord]) {
    photos.sort_by_key(|p| !p.review_state.is_decided());
}

/// Reorder albums for presentation. Stable, so ties keep load order.
pub fn sort_albums(albums: &mut [Album], order: AlbumSortOrder) {
    match order {
        AlbumSortOrder::DateDesc => albums.sort_by_key(|a| Reverse(a.key)),
        AlbumSortOrder::DateAsc => albums.sort_by_key(|a| a.key),
        AlbumSortOrder::SizeDesc => albums.sort_by_key(|a| Reverse(a.total_count())),
        AlbumSortOrder::SizeAsc => albums.sort_by_key(|a| a.total_count()),
        AlbumSortOrder::UnfinishedDesc => albums.sort_by_key(|a| Reverse(a.undecided_count())),
        AlbumSortOrder::UnfinishedAsc => albums.sort_by_key(|a| a.undecided_count()),
    }
}
