//! Database schema definitions
//!
//! One marker table per hierarchy level plus the notification error journal.
//! Marker ids are tenant-prefixed text; deployments that predate the tenant
//! prefix carry integer id columns and are upgraded in place by the
//! migration routine at startup.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Freshness markers, one table per hierarchy level
CREATE TABLE IF NOT EXISTS Forums (
    ForumId TEXT PRIMARY KEY,
    Updated TEXT
);

CREATE TABLE IF NOT EXISTS Topics (
    TopicId TEXT PRIMARY KEY,
    Updated TEXT
);

CREATE TABLE IF NOT EXISTS Posts (
    PostId TEXT PRIMARY KEY,
    Updated TEXT
);

-- Journal of notification send failures; consulted by the circuit breaker,
-- never pruned
CREATE TABLE IF NOT EXISTS Errors (
    Source TEXT NOT NULL,
    Date TEXT NOT NULL,
    Error TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_errors_source ON Errors(Source);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
