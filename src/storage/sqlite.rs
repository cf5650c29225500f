//! SQLite-backed state store
//!
//! Markers and error records are independent single-statement operations;
//! no cross-call transaction is needed outside the migration routine.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::item::ItemKind;
use crate::storage::migration::migrate_column_type;
use crate::storage::schema::initialize_schema;
use crate::storage::{StorageError, StorageResult};

/// Persistent state store for the scanner
pub struct ScanStorage {
    conn: Connection,
}

impl ScanStorage {
    /// Opens (or creates) the database at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(ScanStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Reads the stored freshness marker for an item
    pub fn get_marker(&self, kind: ItemKind, id: &str) -> StorageResult<Option<String>> {
        let query = format!(
            "SELECT Updated FROM {} WHERE {} = ?1",
            kind.table(),
            kind.id_column()
        );
        let marker = self
            .conn
            .query_row(&query, params![id], |row| row.get(0))
            .optional()?;
        Ok(marker)
    }

    /// Writes (or overwrites) the freshness marker for an item
    pub fn set_marker(&mut self, kind: ItemKind, id: &str, marker: &str) -> StorageResult<()> {
        let query = format!(
            "INSERT OR REPLACE INTO {} ({}, Updated) VALUES (?1, ?2)",
            kind.table(),
            kind.id_column()
        );
        self.conn.execute(&query, params![id, marker])?;
        Ok(())
    }

    /// Counts journaled send failures for one source description
    pub fn count_errors(&self, source: &str) -> StorageResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM Errors WHERE Source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Appends one send failure to the error journal
    pub fn record_error(
        &mut self,
        source: &str,
        timestamp: DateTime<Utc>,
        detail: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO Errors (Source, Date, Error) VALUES (?1, ?2, ?3)",
            params![source, timestamp.to_rfc3339(), detail],
        )?;
        Ok(())
    }

    /// Upgrades a pre-tenant database to tenant-prefixed text ids
    ///
    /// Widens the three id columns from their legacy integer type and
    /// prefixes every stored id with `"{tenant}/"`. A database created with
    /// the current schema is left untouched. The value rewrite assumes all
    /// existing rows belong to the single configured forum, which is what
    /// the precheck enforces.
    ///
    /// Returns true if any table was rebuilt.
    pub fn migrate_marker_ids(
        &mut self,
        tenant: &str,
        configured_forums: usize,
    ) -> StorageResult<bool> {
        let mut applied = false;

        for kind in [ItemKind::Forum, ItemKind::Topic, ItemKind::Post] {
            let table = kind.table();
            let column = kind.id_column();
            let prefix = format!("{}/", tenant);

            let rebuilt = migrate_column_type(
                &mut self.conn,
                table,
                column,
                "TEXT",
                || {
                    if configured_forums == 1 {
                        Ok(())
                    } else {
                        Err(StorageError::MigrationPrecheck(format!(
                            "retrofitting tenant ids requires exactly one configured forum, found {}",
                            configured_forums
                        )))
                    }
                },
                |tx| {
                    tx.execute(
                        &format!("UPDATE {} SET {} = ?1 || {}", table, column, column),
                        params![prefix],
                    )?;
                    Ok(())
                },
            )?;

            if rebuilt {
                tracing::info!("Migrated {}.{} to tenant-prefixed text ids", table, column);
                applied = true;
            }
        }

        Ok(applied)
    }
}
