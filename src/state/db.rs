//! Decision ledger trait and SQLite implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::error::LedgerError;
use super::prefs::Preferences;
use super::schema;
use super::types::{Decision, DecisionRecord, LedgerSummary};

/// Trait for decision ledger operations.
///
/// This trait is object-safe and can be used with `Arc<dyn DecisionLedger>`
/// for shared access across async tasks. Every method performs blocking
/// storage I/O off the calling task.
#[async_trait]
pub trait DecisionLedger: Send + Sync {
    /// All photos currently marked for deletion.
    async fn get_deleted_ids(&self) -> Result<HashSet<i64>, LedgerError>;

    /// All photos currently marked as kept.
    async fn get_kept_ids(&self) -> Result<HashSet<i64>, LedgerError>;

    /// Upsert a decision by `source_id`.
    ///
    /// Any previous decision for the same identity is removed in the same
    /// transaction, so the ledger never holds two rows for one photo.
    async fn record(&self, record: &DecisionRecord) -> Result<(), LedgerError>;

    /// Record a delete decision for a photo.
    async fn record_delete(
        &self,
        source_id: i64,
        source_path: &str,
        size_bytes: u64,
    ) -> Result<(), LedgerError> {
        self.record(&DecisionRecord::new(
            source_id,
            source_path,
            size_bytes,
            Decision::Delete,
        ))
        .await
    }

    /// Record a keep decision for a photo.
    async fn record_keep(
        &self,
        source_id: i64,
        source_path: &str,
        size_bytes: u64,
    ) -> Result<(), LedgerError> {
        self.record(&DecisionRecord::new(
            source_id,
            source_path,
            size_bytes,
            Decision::Keep,
        ))
        .await
    }

    /// Turn an existing delete decision into a keep decision in place.
    ///
    /// Returns `false` (and changes nothing) if no delete decision exists.
    async fn flip_to_keep(&self, source_id: i64) -> Result<bool, LedgerError>;

    /// Remove the decision for a photo. Removing a missing entry is not an error.
    ///
    /// Returns whether a row was removed.
    async fn remove_decision(&self, source_id: i64) -> Result<bool, LedgerError>;

    // ── Batch operations ──

    /// Flip several delete decisions to keep in one transaction.
    ///
    /// Returns the number of rows changed.
    async fn flip_to_keep_batch(&self, source_ids: &[i64]) -> Result<u64, LedgerError>;

    /// Remove several decisions in one transaction.
    ///
    /// Returns the number of rows removed.
    async fn remove_decisions(&self, source_ids: &[i64]) -> Result<u64, LedgerError>;

    /// Remove the delete decisions among `source_ids` in one transaction,
    /// leaving keep decisions in place.
    ///
    /// Returns the removed records.
    async fn remove_deleted_decisions(
        &self,
        source_ids: &[i64],
    ) -> Result<Vec<DecisionRecord>, LedgerError>;

    // ── Inspection ──

    /// Get the decision for a single photo.
    async fn get_decision(&self, source_id: i64) -> Result<Option<DecisionRecord>, LedgerError>;

    /// Get every decision in the ledger.
    async fn get_all_decisions(&self) -> Result<Vec<DecisionRecord>, LedgerError>;

    /// Get a summary of the ledger contents.
    async fn get_summary(&self) -> Result<LedgerSummary, LedgerError>;
}

/// SQLite implementation of the decision ledger.
///
/// The same database file also holds the preferences table, reachable via
/// [`SqliteStateDb::preferences`].
pub struct SqliteStateDb {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    /// All operations run on the blocking pool via spawn_blocking.
    conn: Arc<Mutex<Connection>>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStateDb {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, LedgerError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| LedgerError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // Enable WAL mode for better concurrent read/write performance
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(LedgerError::Migration)?;

            // NORMAL is still safe with WAL
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(LedgerError::Migration)?;

            // Concurrent writers from other processes wait instead of failing
            conn.busy_timeout(std::time::Duration::from_secs(5))
                .map_err(LedgerError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, LedgerError>(conn)
        })
        .await??;

        tracing::debug!(path = %path.display(), "State database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory().map_err(|e| LedgerError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Preferences handle scoped to `namespace`, sharing this connection.
    pub fn preferences(&self, namespace: &str) -> Preferences {
        Preferences::new(Arc::clone(&self.conn), namespace)
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, LedgerError> + Send + 'static,
    {
        run_blocking(&self.conn, op).await
    }
}

/// Lock `conn` on Tokio's blocking pool and run `op` with it.
pub(crate) async fn run_blocking<T, F>(
    conn: &Arc<Mutex<Connection>>,
    op: F,
) -> Result<T, LedgerError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, LedgerError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|e| LedgerError::StorageFailure(e.to_string()))?;
        op(&mut guard)
    })
    .await?
}

fn query_ids(conn: &Connection, deleted: bool) -> Result<HashSet<i64>, LedgerError> {
    let mut stmt = conn
        .prepare_cached("SELECT source_id FROM completed_photo WHERE deleted = ?1")
        .map_err(LedgerError::query)?;

    let ids = stmt
        .query_map([deleted], |row| row.get::<_, i64>(0))
        .map_err(LedgerError::query)?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(LedgerError::query)?;

    Ok(ids)
}

#[async_trait]
impl DecisionLedger for SqliteStateDb {
    async fn get_deleted_ids(&self) -> Result<HashSet<i64>, LedgerError> {
        self.with_conn(|conn| query_ids(conn, true)).await
    }

    async fn get_kept_ids(&self) -> Result<HashSet<i64>, LedgerError> {
        self.with_conn(|conn| query_ids(conn, false)).await
    }

    async fn record(&self, record: &DecisionRecord) -> Result<(), LedgerError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(LedgerError::query)?;
            tx.execute(
                "DELETE FROM completed_photo WHERE source_id = ?1",
                [record.source_id],
            )
            .map_err(LedgerError::query)?;
            tx.execute(
                "INSERT INTO completed_photo (source_path, deleted, size, source_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    &record.source_path,
                    record.deleted,
                    i64::try_from(record.size_bytes).unwrap_or(i64::MAX),
                    record.source_id,
                ],
            )
            .map_err(LedgerError::query)?;
            tx.commit().map_err(LedgerError::query)?;

            tracing::debug!(
                id = record.source_id,
                decision = record.decision().as_str(),
                "Recorded decision"
            );
            Ok(())
        })
        .await
    }

    async fn flip_to_keep(&self, source_id: i64) -> Result<bool, LedgerError> {
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "UPDATE completed_photo SET deleted = 0 WHERE source_id = ?1 AND deleted = 1",
                    [source_id],
                )
                .map_err(LedgerError::query)?;
            Ok(rows > 0)
        })
        .await
    }

    async fn remove_decision(&self, source_id: i64) -> Result<bool, LedgerError> {
        self.with_conn(move |conn| {
            let rows = conn
                .execute(
                    "DELETE FROM completed_photo WHERE source_id = ?1",
                    [source_id],
                )
                .map_err(LedgerError::query)?;
            Ok(rows > 0)
        })
        .await
    }

    async fn flip_to_keep_batch(&self, source_ids: &[i64]) -> Result<u64, LedgerError> {
        if source_ids.is_empty() {
            return Ok(0);
        }
        let ids = source_ids.to_vec();
        self.with_conn(move |conn| {
            batch_execute(
                conn,
                "UPDATE completed_photo SET deleted = 0 WHERE source_id = ?1 AND deleted = 1",
                &ids,
            )
        })
        .await
    }

    async fn remove_decisions(&self, source_ids: &[i64]) -> Result<u64, LedgerError> {
        if source_ids.is_empty() {
            return Ok(0);
        }
        let ids = source_ids.to_vec();
        self.with_conn(move |conn| {
            batch_execute(conn, "DELETE FROM completed_photo WHERE source_id = ?1", &ids)
        })
        .await
    }

    async fn remove_deleted_decisions(
        &self,
        source_ids: &[i64],
    ) -> Result<Vec<DecisionRecord>, LedgerError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = source_ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(LedgerError::query)?;
            let mut removed = Vec::new();
            {
                let mut select = tx
                    .prepare_cached(
                        "SELECT source_id, source_path, size, deleted FROM completed_photo WHERE source_id = ?1 AND deleted = 1",
                    )
                    .map_err(LedgerError::query)?;
                let mut delete = tx
                    .prepare_cached(
                        "DELETE FROM completed_photo WHERE source_id = ?1 AND deleted = 1",
                    )
                    .map_err(LedgerError::query)?;
                for id in &ids {
                    let record = select
                        .query_row([id], row_to_decision)
                        .optional()
                        .map_err(LedgerError::query)?;
                    if let Some(record) = record {
                        delete.execute([id]).map_err(LedgerError::query)?;
                        removed.push(record);
                    }
                }
            }
            tx.commit().map_err(LedgerError::query)?;
            Ok(removed)
        })
        .await
    }

    async fn get_decision(&self, source_id: i64) -> Result<Option<DecisionRecord>, LedgerError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT source_id, source_path, size, deleted FROM completed_photo WHERE source_id = ?1",
                [source_id],
                row_to_decision,
            )
            .optional()
            .map_err(LedgerError::query)
        })
        .await
    }

    async fn get_all_decisions(&self) -> Result<Vec<DecisionRecord>, LedgerError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT source_id, source_path, size, deleted FROM completed_photo ORDER BY _id",
                )
                .map_err(LedgerError::query)?;

            let records = stmt
                .query_map([], row_to_decision)
                .map_err(LedgerError::query)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(LedgerError::query)?;

            Ok(records)
        })
        .await
    }

    async fn get_summary(&self) -> Result<LedgerSummary, LedgerError> {
        self.with_conn(|conn| {
            let (total, deleted, pending_delete_bytes): (i64, i64, i64) = conn
                .query_row(
                    "SELECT COUNT(*), COALESCE(SUM(deleted), 0), COALESCE(SUM(CASE WHEN deleted = 1 THEN size ELSE 0 END), 0) FROM completed_photo",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .map_err(LedgerError::query)?;

            Ok(LedgerSummary {
                total: total as u64,
                deleted: deleted as u64,
                kept: (total - deleted) as u64,
                pending_delete_bytes: pending_delete_bytes.max(0) as u64,
            })
        })
        .await
    }
}

/// Run a single-parameter statement once per id inside one transaction.
fn batch_execute(conn: &mut Connection, sql: &str, ids: &[i64]) -> Result<u64, LedgerError> {
    // Dropping an uncommitted transaction rolls it back
    let tx = conn.transaction().map_err(LedgerError::query)?;
    let mut changed = 0u64;
    {
        let mut stmt = tx.prepare_cached(sql).map_err(LedgerError::query)?;
        for id in ids {
            changed += stmt.execute([id]).map_err(LedgerError::query)? as u64;
        }
    }
    tx.commit().map_err(LedgerError::query)?;
    Ok(changed)
}

/// Convert a database row to a DecisionRecord.
fn row_to_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<DecisionRecord> {
    let size: i64 = row.get(2)?;
    Ok(DecisionRecord {
        source_id: row.get(0)?,
        source_path: row.get(1)?,
        size_bytes: size.max(0) as u64,
        deleted: row.get(3)?,
    })
}
