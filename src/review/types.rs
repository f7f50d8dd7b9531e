//! Review records and month albums.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::inventory::InventoryRow;
use crate::state::{Decision, DecisionRecord};

/// Where a photo stands in the triage flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Undecided,
    Kept,
    Deleted,
}

impl ReviewState {
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undecided => "undecided",
            Self::Kept => "kept",
            Self::Deleted => "deleted",
        }
    }
}

impl From<Decision> for ReviewState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Keep => Self::Kept,
            Decision::Delete => Self::Deleted,
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A photo merged with its recorded decision. Rebuilt on every load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub display_name: String,
    pub path: String,
    /// Milliseconds since epoch, never zero.
    pub effective_timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub review_state: ReviewState,
}

impl PhotoRecord {
    pub fn from_row(row: InventoryRow, review_state: ReviewState) -> Self {
        Self {
            effective_timestamp: row.effective_timestamp(),
            id: row.id,
            display_name: row.display_name,
            path: row.path,
            width: row.width,
            height: row.height,
            size_bytes: row.size_bytes,
            latitude: row.latitude,
            longitude: row.longitude,
            review_state,
        }
    }

    /// Ledger entry recording `decision` for this photo.
    pub fn to_decision(&self, decision: Decision) -> DecisionRecord {
        DecisionRecord::new(self.id, self.path.clone(), self.size_bytes, decision)
    }
}

/// Calendar month in the local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlbumKey {
    pub year: i32,
    pub month: u32,
}

impl AlbumKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing `millis` in local time. `None` when out of range.
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        let local = DateTime::from_timestamp_millis(millis)?.with_timezone(&Local);
        Some(Self {
            year: local.year(),
            month: local.month(),
        })
    }

    /// Display label such as "October, 2025".
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(date) => date.format("%B, %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for AlbumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for AlbumKey {
    type Err = String;

    /// Parse `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YEAR-MONTH, got '{s}'"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{s}'"))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

/// Photos from one calendar month, decided photos first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Album {
    pub key: AlbumKey,
    pub label: String,
    pub photos: Vec<PhotoRecord>,
}

impl Album {
    pub fn new(key: AlbumKey) -> Self {
        Self {
            key,
            label: key.label(),
            photos: Vec::new(),
        }
    }

    pub fn total_count(&self) -> usize {
        self.photos.len()
    }

    fn count_state(&self, state: ReviewState) -> usize {
        self.photos
            .iter()
            .filter(|p| p.review_state == state)
            .count()
    }

    pub fn kept_count(&self) -> usize {
        self.count_state(ReviewState::Kept)
    }

    pub fn deleted_count(&self) -> usize {
        self.count_state(ReviewState::Deleted)
    }

    /// Number of decided photos. Since decided photos come first this is also
    /// the index of the first undecided one.
    pub fn decided_count(&self) -> usize {
        self.photos
            .iter()
            .take_while(|p| p.review_state.is_decided())
            .count()
    }

    pub fn undecided_count(&self) -> usize {
        self.total_count() - self.decided_count()
    }

    pub fn pending_delete_bytes(&self) -> u64 {
        self.photos
            .iter()
            .filter(|p| p.review_state == ReviewState::Deleted)
            .map(|p| p.size_bytes)
            .sum()
    }

    /// Every photo was kept.
    pub fn is_completed(&self) -> bool {
        !self.photos.is_empty() && self.kept_count() == self.total_count()
    }

    pub fn is_fully_decided(&self) -> bool {
        self.undecided_count() == 0
    }

    /// Effective timestamp of the first photo.
    pub fn date_time(&self) -> Option<i64> {
        self.photos.first().map(|p| p.effective_timestamp)
    }

    /// First undecided photo, or the last photo when all are decided.
    pub fn cover(&self) -> Option<&PhotoRecord> {
        self.photos
            .get(self.decided_count())
            .or_else(|| self.photos.last())
    }

    /// Photos waiting for physical deletion.
    pub fn deleted_photos(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.photos
            .iter()
            .filter(|p| p.review_state == ReviewState::Deleted)
    }

    pub fn photo(&self, id: i64) -> Option<&PhotoRecord> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn summary(&self) -> AlbumSummary {
        AlbumSummary {
            key: self.key.to_string(),
            label: self.label.clone(),
            total: self.total_count(),
            kept: self.kept_count(),
            deleted: self.deleted_count(),
            undecided: self.undecided_count(),
            pending_delete_bytes: self.pending_delete_bytes(),
            cover_id: self.cover().map(|p| p.id),
            date_time: self.date_time(),
            completed: self.is_completed(),
            fully_decided: self.is_fully_decided(),
        }
    }
}

/// Album statistics without the photo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumSummary {
    pub key: String,
    pub label: String,
    pub total: usize,
    pub kept: usize,
    pub deleted: usize,
    pub undecided: usize,
    pub pending_delete_bytes: u64,
    pub cover_id: Option<i64>,
    /// Effective timestamp (ms) of the first photo.
    pub date_time: Option<i64>,
    pub completed: bool,
    pub fully_decided: bool,
}
