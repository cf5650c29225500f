//! Online column-type migration
//!
//! SQLite has no `ALTER TABLE … ALTER COLUMN` statement, so changing a
//! column's declared type means rebuilding the table: create a shadow table
//! with the new definition, copy every row across, drop the original, and
//! rename the shadow into place — all inside one transaction, with foreign
//! key enforcement suspended around it. The routine compares the rewritten
//! column list against the stored definition first, which is what makes it
//! idempotent across repeated startups.

use rusqlite::{params, Connection, Transaction};

use crate::storage::{StorageError, StorageResult};

/// Keywords that terminate a column's type tokens within its definition
const CONSTRAINT_KEYWORDS: [&str; 9] = [
    "PRIMARY",
    "NOT",
    "NULL",
    "UNIQUE",
    "DEFAULT",
    "REFERENCES",
    "CHECK",
    "COLLATE",
    "GENERATED",
];

/// Changes one column's declared type via a transactional rebuild
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `table` - Table holding the column
/// * `column` - Column whose declared type changes
/// * `new_type` - The new declared type (e.g. `"TEXT"`)
/// * `precheck` - Asserted before any side effect, only when a rebuild is
///   actually needed
/// * `post_update` - Runs inside the rebuild transaction, after the rename
///   and before commit; used to rewrite existing values into the new
///   convention
///
/// # Returns
///
/// * `Ok(true)` - The table was rebuilt and `post_update` ran
/// * `Ok(false)` - The definition already matched; nothing was touched
/// * `Err(StorageError)` - Schema lookup, precheck, or rebuild failure; the
///   transaction leaves no partially-migrated state behind
pub fn migrate_column_type<P, U>(
    conn: &mut Connection,
    table: &str,
    column: &str,
    new_type: &str,
    precheck: P,
    post_update: U,
) -> StorageResult<bool>
where
    P: FnOnce() -> StorageResult<()>,
    U: FnOnce(&Transaction) -> StorageResult<()>,
{
    let table_sql: String = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )
        .map_err(|_| StorageError::TableNotFound(table.to_string()))?;

    let current = column_definitions(&table_sql)?;
    let rebuilt = replace_column_type(&current, table, column, new_type)?;
    if rebuilt == current {
        return Ok(false);
    }

    precheck()?;

    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    let result = rebuild_table(conn, table, &rebuilt, post_update);
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    result.map(|_| true)
}

fn rebuild_table<U>(
    conn: &mut Connection,
    table: &str,
    definitions: &str,
    post_update: U,
) -> StorageResult<()>
where
    U: FnOnce(&Transaction) -> StorageResult<()>,
{
    let shadow = format!("{}_migration", table);

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE {shadow} ({definitions});
         INSERT INTO {shadow} SELECT * FROM {table};
         DROP TABLE {table};
         ALTER TABLE {shadow} RENAME TO {table};"
    ))?;
    post_update(&tx)?;
    tx.commit()?;

    Ok(())
}

/// Extracts the normalized column-definition list from a CREATE TABLE
/// statement
fn column_definitions(table_sql: &str) -> StorageResult<String> {
    let open = table_sql.find('(').ok_or_else(|| {
        StorageError::MalformedSchema(format!("no column list in '{}'", table_sql))
    })?;
    let close = table_sql.rfind(')').ok_or_else(|| {
        StorageError::MalformedSchema(format!("unterminated column list in '{}'", table_sql))
    })?;

    let body = &table_sql[open + 1..close];
    Ok(split_definitions(body).join(", "))
}

/// Rewrites the type tokens of one column, leaving names, order and
/// constraints untouched
fn replace_column_type(
    definitions: &str,
    table: &str,
    column: &str,
    new_type: &str,
) -> StorageResult<String> {
    let mut rewritten = Vec::new();
    let mut found = false;

    for definition in split_definitions(definitions) {
        let mut tokens = definition.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };

        if !name.trim_matches('"').eq_ignore_ascii_case(column) {
            rewritten.push(definition);
            continue;
        }

        found = true;
        let remainder: Vec<&str> = tokens.collect();
        let constraints_at = remainder
            .iter()
            .position(|token| {
                CONSTRAINT_KEYWORDS
                    .iter()
                    .any(|kw| token.eq_ignore_ascii_case(kw))
            })
            .unwrap_or(remainder.len());

        let mut parts = vec![name, new_type];
        parts.extend(&remainder[constraints_at..]);
        rewritten.push(parts.join(" "));
    }

    if !found {
        return Err(StorageError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        });
    }

    Ok(rewritten.join(", "))
}

/// Splits a column list on top-level commas, trimming each entry
fn split_definitions(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut current = String::new();

    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE Topics (TopicId INTEGER PRIMARY KEY, Updated TEXT);
            INSERT INTO Topics VALUES (1, 'a');
            INSERT INTO Topics VALUES (2, 'b');
        ",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_replace_column_type_keeps_constraints() {
        let rewritten = replace_column_type(
            "TopicId INTEGER PRIMARY KEY, Updated TEXT",
            "Topics",
            "TopicId",
            "TEXT",
        )
        .unwrap();
        assert_eq!(rewritten, "TopicId TEXT PRIMARY KEY, Updated TEXT");
    }

    #[test]
    fn test_replace_column_type_missing_column() {
        let result = replace_column_type("Updated TEXT", "Topics", "TopicId", "TEXT");
        assert!(matches!(result, Err(StorageError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_split_definitions_respects_parens() {
        let parts = split_definitions("A TEXT, B INTEGER CHECK (B IN (1, 2)), C TEXT");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "B INTEGER CHECK (B IN (1, 2))");
    }

    #[test]
    fn test_migration_rebuilds_and_rewrites_rows() {
        let mut conn = legacy_conn();

        let applied = migrate_column_type(
            &mut conn,
            "Topics",
            "TopicId",
            "TEXT",
            || Ok(()),
            |tx| {
                tx.execute("UPDATE Topics SET TopicId = 'example/' || TopicId", [])?;
                Ok(())
            },
        )
        .unwrap();
        assert!(applied);

        let ids: Vec<String> = conn
            .prepare("SELECT TopicId FROM Topics ORDER BY TopicId")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec!["example/1", "example/2"]);

        let markers: Vec<String> = conn
            .prepare("SELECT Updated FROM Topics ORDER BY TopicId")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(markers, vec!["a", "b"]);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let mut conn = legacy_conn();

        let first = migrate_column_type(
            &mut conn,
            "Topics",
            "TopicId",
            "TEXT",
            || Ok(()),
            |tx| {
                tx.execute("UPDATE Topics SET TopicId = 'example/' || TopicId", [])?;
                Ok(())
            },
        )
        .unwrap();
        assert!(first);

        let second = migrate_column_type(
            &mut conn,
            "Topics",
            "TopicId",
            "TEXT",
            || panic!("precheck must not run for a no-op migration"),
            |_| panic!("post_update must not run for a no-op migration"),
        )
        .unwrap();
        assert!(!second);

        // The invoker-directed rewrite was applied exactly once.
        let id: String = conn
            .query_row("SELECT TopicId FROM Topics WHERE Updated = 'a'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(id, "example/1");
    }

    #[test]
    fn test_failed_precheck_leaves_table_untouched() {
        let mut conn = legacy_conn();

        let result = migrate_column_type(
            &mut conn,
            "Topics",
            "TopicId",
            "TEXT",
            || Err(StorageError::MigrationPrecheck("nope".to_string())),
            |_| Ok(()),
        );
        assert!(matches!(result, Err(StorageError::MigrationPrecheck(_))));

        // Still the legacy integer definition.
        let sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'Topics'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(sql.contains("INTEGER"));
    }

    #[test]
    fn test_failed_post_update_rolls_back() {
        let mut conn = legacy_conn();

        let result = migrate_column_type(
            &mut conn,
            "Topics",
            "TopicId",
            "TEXT",
            || Ok(()),
            |_| Err(StorageError::MalformedSchema("boom".to_string())),
        );
        assert!(result.is_err());

        // The transaction rolled the rebuild back wholesale.
        let sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE name = 'Topics'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(sql.contains("INTEGER"));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Topics", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_missing_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        let result =
            migrate_column_type(&mut conn, "Nothing", "Id", "TEXT", || Ok(()), |_| Ok(()));
        assert!(matches!(result, Err(StorageError::TableNotFound(_))));
    }
}
