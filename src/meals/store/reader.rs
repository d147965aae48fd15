// src/meals/store/reader.rs

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::{StoreError, StoreResult};
use super::schema::{KEY_LAST_IMPORTED_MESSAGE, KEY_LAST_UPDATE};
use crate::meals::{Meal, Portions};

const MEAL_COLUMNS: &str = "row_index, name, total, first_portion, second_portion, eaten";

/// Read-only queries against the sheet
pub struct MealReader;

impl MealReader {
    /// All meals, top of the sheet first
    pub fn list_meals(conn: &Connection) -> StoreResult<Vec<Meal>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM meals ORDER BY row_index ASC",
            MEAL_COLUMNS
        ))?;
        let meals = stmt
            .query_map([], meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    pub fn find_meal(conn: &Connection, row: u32) -> StoreResult<Option<Meal>> {
        let meal = conn
            .query_row(
                &format!("SELECT {} FROM meals WHERE row_index = ?", MEAL_COLUMNS),
                params![row],
                meal_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    pub fn get_meal(conn: &Connection, row: u32) -> StoreResult<Meal> {
        Self::find_meal(conn, row)?.ok_or(StoreError::RowNotFound(row))
    }

    /// Row number one past the last data row
    pub fn next_row(conn: &Connection) -> StoreResult<u32> {
        let max: Option<u32> = conn.query_row("SELECT MAX(row_index) FROM meals", [], |row| row.get(0))?;
        Ok(max.map(|r| r + 1).unwrap_or(crate::meals::FIRST_DATA_ROW))
    }

    pub fn last_update(conn: &Connection) -> StoreResult<Option<String>> {
        read_metadata_value(conn, KEY_LAST_UPDATE)
    }

    pub fn last_imported_message(conn: &Connection) -> StoreResult<Option<String>> {
        read_metadata_value(conn, KEY_LAST_IMPORTED_MESSAGE)
    }
}

fn read_metadata_value(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row("SELECT value FROM _Metadata WHERE key = ?", [key], |row| row.get(0))
        .optional()?;
    Ok(value.flatten())
}

fn meal_from_row(row: &Row<'_>) -> rusqlite::Result<Meal> {
    let first: Option<u32> = row.get(3)?;
    let second: Option<u32> = row.get(4)?;
    let portions = match (first, second) {
        (Some(first), Some(second)) => Some(Portions::new(first, second)),
        _ => None,
    };
    Ok(Meal {
        row: row.get(0)?,
        name: row.get(1)?,
        total: row.get(2)?,
        portions,
        eaten: row.get::<_, i64>(5)? != 0,
    })
}
