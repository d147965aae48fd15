// src/meals/store/schema.rs

use rusqlite::Connection;
use super::error::StoreResult;

pub const MEALS_TABLE: &str = "meals";
pub const METADATA_TABLE: &str = "_Metadata";

/// Sheet-level keys in `_Metadata`.
pub const KEY_LAST_UPDATE: &str = "last_update";
pub const KEY_LAST_IMPORTED_MESSAGE: &str = "last_imported_message";

/// Create the meals table and the key/value `_Metadata` table if they don't exist
pub fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_index INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            total INTEGER NOT NULL DEFAULT 0 CHECK (total >= 0),
            first_portion INTEGER CHECK (first_portion >= 0),   -- NULL when not split
            second_portion INTEGER CHECK (second_portion >= 0),
            eaten INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS _Metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec![METADATA_TABLE.to_string(), MEALS_TABLE.to_string()]);
    }

    #[test]
    fn test_row_index_has_only_its_unique_index() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'meals'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].starts_with("sqlite_autoindex_meals"));
    }
}
