//! Table creation for the tabular store.

use rusqlite::Connection;

use super::statement::TableLayout;
use crate::error::BackendResult;

/// Creates the record table and the configured indexes if they are missing.
pub fn initialize_schema(
    conn: &Connection,
    layout: &TableLayout,
    indexed_columns: &[String],
) -> BackendResult<()> {
    conn.execute(&layout.create_table().sql, [])?;

    for column in indexed_columns {
        let statement = layout.create_index(column)?;
        conn.execute(&statement.sql, [])?;
    }

    tracing::debug!(
        table = layout.table(),
        indexes = indexed_columns.len(),
        "initialized tabular schema"
    );
    Ok(())
}

/// Returns true if some index on `table` covers `column` as its leading key.
pub fn is_indexed(conn: &Connection, table: &str, column: &str) -> BackendResult<bool> {
    let mut indexes = conn.prepare("SELECT name FROM pragma_index_list(?1)")?;
    let names = indexes
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut info = conn.prepare("SELECT name FROM pragma_index_info(?1) WHERE seqno = 0")?;
    for index in names {
        let leading: Option<String> = info
            .query_map([&index], |row| row.get::<_, String>(0))?
            .next()
            .transpose()?;
        if leading.as_deref() == Some(column) {
            return Ok(true);
        }
    }
    Ok(false)
}
