// src/meals/store/connection.rs

use super::error::StoreResult;
use super::schema;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub struct StoreConnection;

impl StoreConnection {
    /// Opens (or creates) the sheet database with WAL journaling and ensures the schema.
    /// PRAGMA settings are per connection, so this must be used for every open.
    pub fn open(path: &Path) -> StoreResult<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // PRAGMA journal_mode returns the mode that was actually set
        let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        if journal_mode.to_uppercase() != "WAL" {
            warn!(
                "Failed to set WAL mode on database {:?}. Current mode: {}",
                path.file_name(),
                journal_mode
            );
        } else {
            debug!("WAL mode activated for database {:?}", path.file_name());
        }

        conn.execute_batch(
            "PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.busy_timeout(Duration::from_millis(5000))?;

        schema::ensure_schema(&conn)?;
        Ok(conn)
    }

    /// In-memory sheet, used by tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Connection> {
        let conn = Connection::open_in_memory()?;
        schema::ensure_schema(&conn)?;
        Ok(conn)
    }
}
