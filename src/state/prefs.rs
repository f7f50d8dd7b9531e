//! Namespaced key-value preferences stored next to the ledger.
//!
//! Values are stored as text. Scalars use their decimal/`true`/`false` form,
//! string sets are JSON arrays. A value that fails to parse reads as the
//! caller's default.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension};

use super::db::run_blocking;
use super::error::LedgerError;

/// Namespace used by the triage features.
pub const SWIPE_CLEAN_NAMESPACE: &str = "swipe_clean";

/// Total bytes freed by finalized deletions.
pub const KEY_CLEANED_SIZE: &str = "cleaned_size";
/// Unix timestamp (seconds) of the last album load.
pub const KEY_LAST_REVIEW_TIME: &str = "last_review_time";
/// Persisted album sort order, see `AlbumSortOrder`.
pub const KEY_ALBUM_SORT_ORDER: &str = "album_sort_order";
/// Whether the first-run hint has already been shown.
pub const KEY_GUIDANCE_SHOWN: &str = "guidance_shown";

/// Handle to one preferences namespace.
#[derive(Clone)]
pub struct Preferences {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>, namespace: &str) -> Self {
        Self {
            conn,
            namespace: namespace.to_string(),
        }
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        run_blocking(&self.conn, move |conn| {
            conn.query_row(
                "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
                [&namespace, &key],
                |row| row.get(0),
            )
            .optional()
            .map_err(LedgerError::query)
        })
        .await
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<(), LedgerError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        run_blocking(&self.conn, move |conn| {
            conn.execute(
                r#"
                INSERT INTO preferences (namespace, key, value) VALUES (?1, ?2, ?3)
                ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value
                "#,
                [&namespace, &key, &value],
            )
            .map_err(LedgerError::query)?;
            Ok(())
        })
        .await
    }

    pub async fn get_i64(&self, key: &str, default: i64) -> Result<i64, LedgerError> {
        Ok(self
            .get_raw(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    pub async fn set_i64(&self, key: &str, value: i64) -> Result<(), LedgerError> {
        self.set_raw(key, value.to_string()).await
    }

    /// Add `delta` to an integer preference in one transaction and return the
    /// new value. A missing or unparsable value counts as zero.
    pub async fn add_i64(&self, key: &str, delta: i64) -> Result<i64, LedgerError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        run_blocking(&self.conn, move |conn| {
            let tx = conn.transaction().map_err(LedgerError::query)?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
                    [&namespace, &key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(LedgerError::query)?;
            let updated = current
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0)
                .saturating_add(delta);
            tx.execute(
                r#"
                INSERT INTO preferences (namespace, key, value) VALUES (?1, ?2, ?3)
                ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value
                "#,
                rusqlite::params![&namespace, &key, updated.to_string()],
            )
            .map_err(LedgerError::query)?;
            tx.commit().map_err(LedgerError::query)?;
            Ok(updated)
        })
        .await
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> Result<bool, LedgerError> {
        Ok(self
            .get_raw(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), LedgerError> {
        self.set_raw(key, value.to_string()).await
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, LedgerError> {
        self.get_raw(key).await
    }

    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        self.set_raw(key, value.to_string()).await
    }

    pub async fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>, LedgerError> {
        Ok(self
            .get_raw(key)
            .await?
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default())
    }

    pub async fn set_string_set(
        &self,
        key: &str,
        values: &BTreeSet<String>,
    ) -> Result<(), LedgerError> {
        let encoded = serde_json::to_string(values)
            .map_err(|e| LedgerError::StorageFailure(e.to_string()))?;
        self.set_raw(key, encoded).await
    }

    /// Remove a key. Missing keys are ignored.
    pub async fn remove(&self, key: &str) -> Result<(), LedgerError> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        run_blocking(&self.conn, move |conn| {
            conn.execute(
                "DELETE FROM preferences WHERE namespace = ?1 AND key = ?2",
                [&namespace, &key],
            )
            .map_err(LedgerError::query)?;
            Ok(())
        })
        .await
    }
}
