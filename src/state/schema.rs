//! Database schema definitions and migrations.
//!
//! Every table and index is described by a [`SchemaObject`] in
//! [`SCHEMA_OBJECTS`]. [`migrate`] walks that list once: objects introduced
//! after the database's current version are created, older objects get their
//! optional upgrade hook.

use rusqlite::Connection;

use super::error::LedgerError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 2;

/// Name of the decision ledger table.
pub const LEDGER_TABLE: &str = "completed_photo";

/// Name of the preferences table.
pub const PREFS_TABLE: &str = "preferences";

/// Upgrade hook for an object that already exists. Receives the version the
/// database is migrating from.
pub(crate) type UpgradeFn = fn(&Connection, i32) -> rusqlite::Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectKind {
    Table,
    Index,
}

/// Declarative description of one schema object.
pub(crate) struct SchemaObject {
    pub name: &'static str,
    pub kind: ObjectKind,
    /// Schema version that first created this object.
    pub introduced_in: i32,
    /// Idempotent `CREATE ... IF NOT EXISTS` statement.
    pub ddl: &'static str,
    pub upgrade: Option<UpgradeFn>,
}

pub(crate) const SCHEMA_OBJECTS: &[SchemaObject] = &[
    SchemaObject {
        name: LEDGER_TABLE,
        kind: ObjectKind::Table,
        introduced_in: 1,
        ddl: r#"
CREATE TABLE IF NOT EXISTS completed_photo (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_path TEXT NOT NULL UNIQUE,
    deleted INTEGER NOT NULL,
    size INTEGER NOT NULL,
    source_id INTEGER NOT NULL UNIQUE
);
"#,
        upgrade: None,
    },
    SchemaObject {
        name: "completedPhotoIndex",
        kind: ObjectKind::Index,
        introduced_in: 1,
        ddl: "CREATE INDEX IF NOT EXISTS completedPhotoIndex ON completed_photo (source_id);",
        upgrade: None,
    },
    SchemaObject {
        name: PREFS_TABLE,
        kind: ObjectKind::Table,
        introduced_in: 2,
        ddl: r#"
CREATE TABLE IF NOT EXISTS preferences (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);
"#,
        upgrade: None,
    },
];

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, LedgerError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// This function is idempotent and safe to call on both new and existing databases.
pub(crate) fn migrate(conn: &Connection) -> Result<(), LedgerError> {
    migrate_objects(conn, SCHEMA_OBJECTS, SCHEMA_VERSION)
}

/// Bring `conn` to `target` using the given object list, in one transaction.
pub(crate) fn migrate_objects(
    conn: &Connection,
    objects: &[SchemaObject],
    target: i32,
) -> Result<(), LedgerError> {
    let current_version = get_schema_version(conn)?;

    if current_version > target {
        return Err(LedgerError::UnsupportedSchemaVersion {
            found: current_version,
            expected: target,
        });
    }
    if current_version == target {
        return Ok(());
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| {
        for object in objects.iter().filter(|o| o.introduced_in <= target) {
            if object.introduced_in > current_version {
                conn.execute_batch(object.ddl)?;
                tracing::debug!(
                    name = object.name,
                    kind = ?object.kind,
                    "Created schema object"
                );
            } else if let Some(upgrade) = object.upgrade {
                upgrade(conn, current_version)?;
                tracing::debug!(
                    name = object.name,
                    from = current_version,
                    "Upgraded schema object"
                );
            }
        }
        set_schema_version(conn, target)
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            if current_version == 0 {
                tracing::debug!("Initialized database schema at version {}", target);
            } else {
                tracing::info!(
                    "Migrated database from schema version {} to {}",
                    current_version,
                    target
                );
            }
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_count(conn: &Connection, kind: &str, name: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_db_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should be no-op
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_unsupported_version() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let result = migrate(&conn);
        assert!(matches!(
            result,
            Err(LedgerError::UnsupportedSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_tables_and_index_created() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        assert_eq!(object_count(&conn, "table", LEDGER_TABLE), 1);
        assert_eq!(object_count(&conn, "table", PREFS_TABLE), 1);
        assert_eq!(object_count(&conn, "index", "completedPhotoIndex"), 1);
    }

    #[test]
    fn test_v1_database_gains_preferences_table() {
        let conn = Connection::open_in_memory().unwrap();
        migrate_objects(&conn, SCHEMA_OBJECTS, 1).unwrap();
        assert_eq!(object_count(&conn, "table", PREFS_TABLE), 0);

        conn.execute(
            "INSERT INTO completed_photo (source_path, deleted, size, source_id) VALUES ('/a.jpg', 1, 10, 5)",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(object_count(&conn, "table", PREFS_TABLE), 1);

        // Existing decisions survive the upgrade
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM completed_photo", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    fn add_note_column(conn: &Connection, _from: i32) -> rusqlite::Result<()> {
        conn.execute_batch("ALTER TABLE t ADD COLUMN note TEXT")
    }

    #[test]
    fn test_upgrade_hook_runs_for_existing_objects_only() {
        let objects_v1 = [SchemaObject {
            name: "t",
            kind: ObjectKind::Table,
            introduced_in: 1,
            ddl: "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY);",
            upgrade: None,
        }];
        let objects_v2 = [SchemaObject {
            name: "t",
            kind: ObjectKind::Table,
            introduced_in: 1,
            ddl: "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY);",
            upgrade: Some(add_note_column),
        }];

        let conn = Connection::open_in_memory().unwrap();
        migrate_objects(&conn, &objects_v1, 1).unwrap();
        migrate_objects(&conn, &objects_v2, 2).unwrap();
        conn.execute("INSERT INTO t (id, note) VALUES (1, 'x')", [])
            .unwrap();

        // A fresh database creates the table without calling the hook
        let fresh = Connection::open_in_memory().unwrap();
        migrate_objects(&fresh, &objects_v2, 2).unwrap();
        assert!(fresh
            .execute("INSERT INTO t (id, note) VALUES (1, 'x')", [])
            .is_err());
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let objects = [
            SchemaObject {
                name: "ok",
                kind: ObjectKind::Table,
                introduced_in: 1,
                ddl: "CREATE TABLE IF NOT EXISTS ok (id INTEGER);",
                upgrade: None,
            },
            SchemaObject {
                name: "broken",
                kind: ObjectKind::Table,
                introduced_in: 1,
                ddl: "CREATE TABLE broken (",
                upgrade: None,
            },
        ];
        let conn = Connection::open_in_memory().unwrap();
        assert!(migrate_objects(&conn, &objects, 1).is_err());
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
        assert_eq!(object_count(&conn, "table", "ok"), 0);
    }
}
