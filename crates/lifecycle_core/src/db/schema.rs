//! Live-schema introspection.
//!
//! Reads declared tables and foreign keys straight from SQLite so callers can
//! compare them with the static association registry.

use super::DbResult;
use rusqlite::Connection;

/// One foreign key declared in the live schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForeignKey {
    /// Table that carries the key column.
    pub table: String,
    /// Key column on `table`.
    pub column: String,
    /// Referenced table.
    pub references: String,
}

/// Lists user tables, sorted by name.
pub fn table_names(conn: &Connection) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name
         FROM sqlite_master
         WHERE type = 'table'
           AND name NOT LIKE 'sqlite_%'
         ORDER BY name ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = Vec::new();
    while let Some(row) = rows.next()? {
        tables.push(row.get(0)?);
    }
    Ok(tables)
}

/// Lists every foreign key of every user table.
pub fn foreign_keys(conn: &Connection) -> DbResult<Vec<ForeignKey>> {
    let mut keys = Vec::new();
    for table in table_names(conn)? {
        let mut stmt = conn.prepare("SELECT \"table\", \"from\" FROM pragma_foreign_key_list(?1);")?;
        let mut rows = stmt.query([table.as_str()])?;
        while let Some(row) = rows.next()? {
            keys.push(ForeignKey {
                table: table.clone(),
                column: row.get(1)?,
                references: row.get(0)?,
            });
        }
    }
    keys.sort();
    Ok(keys)
}

/// Returns whether `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
