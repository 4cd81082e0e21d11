//! Relational schema for electerm data.
//!
//! Every [`Table`] maps to one SQLite table of the same (case-preserved,
//! quoted) name with two columns:
//!
//! - `_id TEXT PRIMARY KEY`: the record identifier, verbatim;
//! - `data TEXT NOT NULL`: the rest of the record as a JSON object.
//!
//! Records stay schema-less; the relational layer only indexes them by
//! identifier. The schema revision is tracked in `PRAGMA user_version`.

use electerm_data_core::Table;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SqliteError};

/// Schema revision written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Quoted SQL identifier for `table`.
pub(crate) fn table_ident(table: Table) -> String {
    format!("\"{}\"", table.as_str())
}

/// Generates `CREATE TABLE IF NOT EXISTS` statements for every table.
pub fn generate_schema_sql() -> String {
    let mut sql = String::new();
    for table in Table::ALL {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    _id TEXT PRIMARY KEY NOT NULL,\n    data TEXT NOT NULL\n);\n",
            table_ident(table)
        ));
    }
    sql
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Creates any missing tables and records [`SCHEMA_VERSION`].
///
/// Safe to call on every open. Runs in a single transaction.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] when the database was written
/// by a newer schema revision.
pub fn apply_schema(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(SqliteError::ConversionError(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&generate_schema_sql())?;
    if current < SCHEMA_VERSION {
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    tx.commit()?;
    Ok(())
}

/// Checks whether the table for `table` exists.
pub fn table_exists(conn: &Connection, table: Table) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema_sql_covers_every_table() {
        let sql = generate_schema_sql();
        for table in Table::ALL {
            assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS \"{table}\"")));
        }
        assert_eq!(sql.matches("_id TEXT PRIMARY KEY").count(), 10);
    }

    #[test]
    fn test_apply_schema_sets_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert!(!table_exists(&conn, Table::DbUpgradeLog).unwrap());

        apply_schema(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
        for table in Table::ALL {
            assert!(table_exists(&conn, table).unwrap(), "{table} missing");
        }
    }

    #[test]
    fn test_apply_schema_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_schema(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO \"bookmarks\" (_id, data) VALUES ('b1', '{}')",
            [],
        )
        .unwrap();
        apply_schema(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"bookmarks\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_apply_schema_rejects_newer_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            apply_schema(&mut conn),
            Err(SqliteError::ConversionError(_))
        ));
    }

    #[test]
    fn test_table_names_are_case_preserved() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_schema(&mut conn).unwrap();
        let name: String = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE name = 'bookmarkGroups'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "bookmarkGroups");
    }
}
