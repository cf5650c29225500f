//! Storage module for persisting scan state
//!
//! This module owns every durable record of the scanner:
//! - "Last updated" freshness markers per forum/topic/post
//! - The notification error journal
//! - The one-time column-type migration used to evolve deployed schemas

mod migration;
mod schema;
mod sqlite;

pub use migration::migrate_column_type;
pub use schema::initialize_schema;
pub use sqlite::ScanStorage;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No such table: {0}")]
    TableNotFound(String),

    #[error("No column {column} in table {table}")]
    ColumnNotFound { table: String, column: String },

    #[error("Malformed schema definition: {0}")]
    MalformedSchema(String),

    #[error("Migration precheck failed: {0}")]
    MigrationPrecheck(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
