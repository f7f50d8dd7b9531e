//! Inventory provider backed by a platform media store database.
//!
//! The store is an SQLite file owned by another process with an `images`
//! table shaped like Android's MediaStore. It is opened read-only for each
//! query so a replaced or temporarily missing file shows up as
//! [`InventoryError::Unavailable`] rather than a stale handle.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Row};

use super::error::InventoryError;
use super::provider::{InventoryProvider, InventoryQuery, InventoryRow, SortOrder};

/// Upper bound on `?` placeholders per statement.
const ID_CHUNK_SIZE: usize = 500;

const SELECT_COLUMNS: &str = "SELECT _id, _display_name, date_added, datetaken, width, height, \
     _data, _size, latitude, longitude FROM images";

const EFFECTIVE_TIMESTAMP_DESC: &str = "ORDER BY CASE WHEN datetaken IS NULL OR datetaken = 0 \
     THEN date_added * 1000 ELSE datetaken END DESC, _id DESC";

/// Read-only handle to a media store database file.
#[derive(Debug, Clone)]
pub struct MediaStoreDb {
    path: PathBuf,
}

impl MediaStoreDb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn connect(path: &Path) -> Result<Connection, InventoryError> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| InventoryError::unavailable(format!("{}: {e}", path.display())))
    }
}

fn order_clause(order: SortOrder) -> &'static str {
    match order {
        SortOrder::EffectiveTimestampDesc => EFFECTIVE_TIMESTAMP_DESC,
        SortOrder::Unordered => "",
    }
}

/// Negative or oversized dimensions read as 0.
fn dimension(value: Option<i64>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn row_to_inventory(row: &Row<'_>) -> rusqlite::Result<InventoryRow> {
    Ok(InventoryRow {
        id: row.get(0)?,
        display_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        date_added: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        date_taken: row.get(3)?,
        width: dimension(row.get(4)?),
        height: dimension(row.get(5)?),
        path: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        size_bytes: row.get::<_, Option<i64>>(7)?.unwrap_or(0).max(0) as u64,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
    })
}

fn query_blocking(
    conn: &Connection,
    query: &InventoryQuery,
) -> Result<Vec<InventoryRow>, InventoryError> {
    let Some(ids) = &query.ids else {
        let sql = format!("{SELECT_COLUMNS} {}", order_clause(query.order));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_inventory)?
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(rows);
    };

    // Chunked lookups can't share one ORDER BY, so sort afterwards.
    let ids: Vec<i64> = ids.iter().copied().collect();
    let mut rows = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("{SELECT_COLUMNS} WHERE _id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt.query_map(rusqlite::params_from_iter(chunk), row_to_inventory)?;
        for row in found {
            rows.push(row?);
        }
    }
    query.order.apply(&mut rows);
    Ok(rows)
}

#[async_trait::async_trait]
impl InventoryProvider for MediaStoreDb {
    async fn query(&self, query: &InventoryQuery) -> Result<Vec<InventoryRow>, InventoryError> {
        let path = self.path.clone();
        let filtered = query.ids.is_some();
        let query = query.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&path)?;
            query_blocking(&conn, &query)
        })
        .await??;
        tracing::debug!(count = rows.len(), filtered, "Queried media store");
        Ok(rows)
    }

    async fn query_ids(&self) -> Result<Vec<i64>, InventoryError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&path)?;
            let mut stmt = conn.prepare("SELECT _id FROM images")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
        .await?
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::provider::testing::row;

    fn temp_store(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("swipeclean_test_media_store");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[tokio::test]
    async fn test_query_orders_by_effective_timestamp() {
        let path = temp_store("ordered.db");
        fixture::create(
            &path,
            &[
                row(1, Some(0), 100),
                row(2, Some(5000), 0),
                row(3, None, 300),
                row(4, Some(100_000), 0),
            ],
        );

        let store = MediaStoreDb::new(&path);
        let rows = store.query(&InventoryQuery::all()).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        // 3 => 300000, 4 and 1 => 100000 (id tie-break), 2 => 5000
        assert_eq!(ids, vec![3, 4, 1, 2]);
        assert_eq!(rows[3].date_taken, Some(5000));
        assert_eq!(rows[1].path, "/sdcard/DCIM/Camera/IMG_0004.jpg");
    }

    #[tokio::test]
    async fn test_query_tolerates_negative_dimensions() {
        let path = temp_store("negative_dims.db");
        fixture::create(&path, &[row(1, Some(10), 0), row(2, Some(20), 0)]);
        Connection::open(&path)
            .unwrap()
            .execute("UPDATE images SET width = -1 WHERE _id = 2", [])
            .unwrap();

        let store = MediaStoreDb::new(&path);
        let rows = store.query(&InventoryQuery::all()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[0].width, 0);
        assert_eq!(rows[0].height, 3024);
        assert_eq!(rows[1].width, 4032);
    }

    #[tokio::test]
    async fn test_query_filtered_by_ids() {
        let path = temp_store("filtered.db");
        fixture::create(
            &path,
            &[row(1, Some(10), 0), row(2, Some(30), 0), row(3, Some(20), 0)],
        );

        let store = MediaStoreDb::new(&path);
        let rows = store
            .query(&InventoryQuery::by_ids([1, 2, 99]))
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_query_ids() {
        let path = temp_store("ids.db");
        fixture::create(&path, &[row(5, Some(1), 0), row(6, Some(2), 0)]);

        let store = MediaStoreDb::new(&path);
        let mut ids = store.query_ids().await.unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_null_columns_read_as_defaults() {
        let path = temp_store("nulls.db");
        fixture::create(&path, &[]);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("INSERT INTO images (_id, date_added) VALUES (9, 50)", [])
                .unwrap();
        }

        let rows = MediaStoreDb::new(&path)
            .query(&InventoryQuery::all())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_taken, None);
        assert_eq!(rows[0].size_bytes, 0);
        assert_eq!(rows[0].effective_timestamp(), 50_000);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let path = temp_store("does_not_exist.db");
        let _ = std::fs::remove_file(&path);

        let result = MediaStoreDb::new(&path).query(&InventoryQuery::all()).await;
        assert!(matches!(result, Err(InventoryError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_missing_table_is_unavailable() {
        let path = temp_store("no_table.db");
        let _ = std::fs::remove_file(&path);
        Connection::open(&path).unwrap();

        let result = MediaStoreDb::new(&path).query_ids().await;
        assert!(matches!(result, Err(InventoryError::Unavailable { .. })));
    }
}
