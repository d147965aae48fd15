// src/meals/store/test_helpers.rs
// Test utilities for store tests

#![cfg(test)]

use rusqlite::{params, Connection};

use super::connection::StoreConnection;

/// In-memory sheet with the production schema
pub fn setup_store() -> Connection {
    StoreConnection::open_in_memory().unwrap()
}

/// Insert a meal row directly, bypassing the writer (and its timestamp).
///
/// # Example
/// ```ignore
/// let conn = setup_store();
/// seed_meal(&conn, 2, "Chicken Pesto", 4, Some((3, 1)));
/// ```
pub fn seed_meal(conn: &Connection, row: u32, name: &str, total: u32, portions: Option<(u32, u32)>) {
    conn.execute(
        "INSERT INTO meals (row_index, name, total, first_portion, second_portion) VALUES (?, ?, ?, ?, ?)",
        params![row, name, total, portions.map(|p| p.0), portions.map(|p| p.1)],
    )
    .unwrap();
}

/// (row, name, total) triples in sheet order
pub fn rows(conn: &Connection) -> Vec<(u32, String, u32)> {
    let mut stmt = conn
        .prepare("SELECT row_index, name, total FROM meals ORDER BY row_index")
        .unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}
