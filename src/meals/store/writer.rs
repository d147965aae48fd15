// src/meals/store/writer.rs
// Write operations on the sheet. Every mutation rewrites the sheet's
// last_update stamp inside the same transaction so polling clients notice it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use super::error::{StoreError, StoreResult};
use super::reader::MealReader;
use super::schema::{KEY_LAST_IMPORTED_MESSAGE, KEY_LAST_UPDATE};
use crate::meals::import::OrderLine;
use crate::meals::{name_key, Person, Portions, FIRST_DATA_ROW};

/// Result of a single-unit decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Applied { remaining: u32 },
    /// Nothing left to take
    AlreadyEmpty,
    /// Stock remains but all of it is assigned to people
    Assigned,
}

/// Counts reported by an import merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub restocked: usize,
    pub appended: usize,
}

/// Database writer - all sheet mutations go through here
pub struct MealWriter;

impl MealWriter {
    /// Take one unit of unassigned stock
    pub fn decrement_total(conn: &Connection, row: u32) -> StoreResult<DecrementOutcome> {
        let tx = conn.unchecked_transaction()?;
        let meal = MealReader::get_meal(&tx, row)?;

        if meal.total == 0 {
            return Ok(DecrementOutcome::AlreadyEmpty);
        }
        if meal.unassigned() == 0 {
            return Ok(DecrementOutcome::Assigned);
        }

        let remaining = meal.total - 1;
        tx.execute(
            "UPDATE meals SET total = ?, updated_at = CURRENT_TIMESTAMP WHERE row_index = ?",
            params![remaining, row],
        )?;
        touch_in(&tx)?;
        tx.commit()?;
        debug!("decrement_total: row {} now {}", row, remaining);
        Ok(DecrementOutcome::Applied { remaining })
    }

    /// Take one unit from a person's portion, and from the total with it
    pub fn decrement_person(conn: &Connection, row: u32, person: Person) -> StoreResult<DecrementOutcome> {
        let tx = conn.unchecked_transaction()?;
        let meal = MealReader::get_meal(&tx, row)?;

        let Some(mut portions) = meal.portions else {
            return Ok(DecrementOutcome::AlreadyEmpty);
        };
        if portions.get(person) == 0 {
            return Ok(DecrementOutcome::AlreadyEmpty);
        }

        *portions.get_mut(person) -= 1;
        // portions never exceed the total, so the total is at least 1 here
        let remaining = meal.total.saturating_sub(1);
        tx.execute(
            "UPDATE meals SET total = ?, first_portion = ?, second_portion = ?, updated_at = CURRENT_TIMESTAMP
             WHERE row_index = ?",
            params![remaining, portions.first, portions.second, row],
        )?;
        touch_in(&tx)?;
        tx.commit()?;
        debug!("decrement_person: row {} {:?} now {}", row, person, portions.get(person));
        Ok(DecrementOutcome::Applied { remaining: portions.get(person) })
    }

    /// Save per-person splits. Each split must account for the whole total.
    pub fn save_assignments(conn: &Connection, assignments: &[(u32, Portions)]) -> StoreResult<()> {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE meals SET first_portion = ?, second_portion = ?, updated_at = CURRENT_TIMESTAMP
                 WHERE row_index = ?",
            )?;
            for (row, portions) in assignments {
                let meal = MealReader::get_meal(&tx, *row)?;
                if portions.assigned() != meal.total {
                    return Err(StoreError::Invalid(format!(
                        "Portions for '{}' (row {}) add up to {}, expected {}",
                        meal.name,
                        row,
                        portions.assigned(),
                        meal.total
                    )));
                }
                stmt.execute(params![portions.first, portions.second, row])?;
            }
        }
        touch_in(&tx)?;
        tx.commit()?;
        info!("save_assignments: saved {} assignment(s)", assignments.len());
        Ok(())
    }

    pub fn set_eaten(conn: &Connection, row: u32, eaten: bool) -> StoreResult<()> {
        let tx = conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE meals SET eaten = ?, updated_at = CURRENT_TIMESTAMP WHERE row_index = ?",
            params![eaten as i32, row],
        )?;
        if updated == 0 {
            return Err(StoreError::RowNotFound(row));
        }
        touch_in(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Append a meal below the last row, returning its row number
    pub fn append_meal(conn: &Connection, name: &str, total: u32) -> StoreResult<u32> {
        let tx = conn.unchecked_transaction()?;
        let row = append_in(&tx, name, total)?;
        touch_in(&tx)?;
        tx.commit()?;
        Ok(row)
    }

    /// Delete the listed rows, then replace whatever remains with `new_meals`,
    /// written from the first data row down.
    pub fn replace_list(conn: &Connection, rows_to_delete: &[u32], new_meals: &[(String, u32)]) -> StoreResult<()> {
        if let Some((name, _)) = new_meals.iter().find(|(name, _)| name.trim().is_empty()) {
            return Err(StoreError::Invalid(format!("Invalid meal name '{}'", name)));
        }

        let tx = conn.unchecked_transaction()?;

        // Bottom-up so earlier deletions don't shift the rows still to delete
        let mut rows: Vec<u32> = rows_to_delete.to_vec();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        for row in &rows {
            delete_and_shift(&tx, *row)?;
        }

        let cleared = tx.execute("DELETE FROM meals", [])?;
        debug!("replace_list: deleted {} row(s), cleared {} more", rows.len(), cleared);

        {
            let mut stmt = tx.prepare("INSERT INTO meals (row_index, name, total) VALUES (?, ?, ?)")?;
            for (offset, (name, qty)) in new_meals.iter().enumerate() {
                stmt.execute(params![FIRST_DATA_ROW + offset as u32, name.trim(), qty])?;
            }
        }

        touch_in(&tx)?;
        tx.commit()?;
        info!("replace_list: wrote {} new meal(s)", new_meals.len());
        Ok(())
    }

    /// Merge imported order lines: restock meals with the same name, append the rest.
    pub fn merge_import(
        conn: &Connection,
        lines: &[OrderLine],
        message_id: Option<&str>,
    ) -> StoreResult<MergeSummary> {
        let tx = conn.unchecked_transaction()?;

        let mut existing: HashMap<String, (u32, u32)> = HashMap::new();
        for meal in MealReader::list_meals(&tx)? {
            existing.entry(name_key(&meal.name)).or_insert((meal.row, meal.total));
        }

        let mut summary = MergeSummary::default();
        for (name, qty) in aggregate_lines(lines)? {
            match existing.get_mut(&name_key(&name)) {
                Some((row, total)) => {
                    *total = checked_restock(&name, *total, qty)?;
                    tx.execute(
                        "UPDATE meals SET total = ?, eaten = 0, updated_at = CURRENT_TIMESTAMP WHERE row_index = ?",
                        params![*total, *row],
                    )?;
                    summary.restocked += 1;
                }
                None => {
                    let row = append_in(&tx, &name, qty)?;
                    existing.insert(name_key(&name), (row, qty));
                    summary.appended += 1;
                }
            }
        }

        if let Some(id) = message_id {
            set_metadata(&tx, KEY_LAST_IMPORTED_MESSAGE, id)?;
        }
        touch_in(&tx)?;
        tx.commit()?;
        info!(
            "merge_import: restocked {}, appended {}",
            summary.restocked, summary.appended
        );
        Ok(summary)
    }

}

/// Sum duplicate names within one import, keeping first-seen order
fn aggregate_lines(lines: &[OrderLine]) -> StoreResult<Vec<(String, u32)>> {
    let mut merged: Vec<(String, u32)> = Vec::new();
    for line in lines {
        let key = name_key(&line.name);
        match merged.iter_mut().find(|(name, _)| name_key(name) == key) {
            Some((name, qty)) => *qty = checked_restock(name, *qty, line.qty)?,
            None => merged.push((key, line.qty)),
        }
    }
    Ok(merged)
}

fn checked_restock(name: &str, current: u32, added: u32) -> StoreResult<u32> {
    current
        .checked_add(added)
        .ok_or_else(|| StoreError::Invalid(format!("Quantity for '{}' is out of range", name)))
}

fn append_in(tx: &Transaction, name: &str, total: u32) -> StoreResult<u32> {
    let row = MealReader::next_row(tx)?;
    tx.execute(
        "INSERT INTO meals (row_index, name, total) VALUES (?, ?, ?)",
        params![row, name.trim(), total],
    )?;
    Ok(row)
}

fn delete_and_shift(tx: &Transaction, row: u32) -> StoreResult<()> {
    let deleted = tx.execute("DELETE FROM meals WHERE row_index = ?", params![row])?;
    if deleted == 0 {
        return Err(StoreError::RowNotFound(row));
    }
    // Two phases through negative indices so the UNIQUE constraint never sees a collision
    tx.execute(
        "UPDATE meals SET row_index = -(row_index - 1) WHERE row_index > ?",
        params![row],
    )?;
    tx.execute("UPDATE meals SET row_index = -row_index WHERE row_index < 0", [])?;
    Ok(())
}

fn set_metadata(tx: &Transaction, key: &str, value: &str) -> StoreResult<()> {
    tx.execute(
        "INSERT INTO _Metadata (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn touch_in(tx: &Transaction) -> StoreResult<String> {
    let previous = MealReader::last_update(tx)?;
    let stamp = next_stamp(previous.as_deref(), Utc::now());
    set_metadata(tx, KEY_LAST_UPDATE, &stamp)?;
    Ok(stamp)
}

/// RFC 3339 stamp that is strictly later than `previous`, even if the clock hasn't moved
fn next_stamp(previous: Option<&str>, now: DateTime<Utc>) -> String {
    let formatted = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let previous = previous
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|p| p.with_timezone(&Utc));
    match previous {
        // compared at stamp precision, two writes in the same millisecond must still differ
        Some(prev) if prev.to_rfc3339_opts(SecondsFormat::Millis, true) >= formatted => {
            (prev + Duration::milliseconds(1)).to_rfc3339_opts(SecondsFormat::Millis, true)
        }
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::store::test_helpers::{rows, seed_meal, setup_store};

    fn line(name: &str, qty: u32) -> OrderLine {
        OrderLine { name: name.to_string(), qty }
    }

    #[test]
    fn test_decrement_total_stops_at_zero() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Tacos", 1, None);

        assert_eq!(
            MealWriter::decrement_total(&conn, 2).unwrap(),
            DecrementOutcome::Applied { remaining: 0 }
        );
        assert_eq!(MealWriter::decrement_total(&conn, 2).unwrap(), DecrementOutcome::AlreadyEmpty);
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().total, 0);
    }

    #[test]
    fn test_decrement_total_refuses_assigned_stock() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Chicken Pesto", 3, Some((2, 1)));
        assert_eq!(MealWriter::decrement_total(&conn, 2).unwrap(), DecrementOutcome::Assigned);
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().total, 3);
    }

    #[test]
    fn test_decrement_person_moves_portion_and_total_together() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Chicken Pesto", 3, Some((2, 1)));

        let outcome = MealWriter::decrement_person(&conn, 2, Person::Second).unwrap();
        assert_eq!(outcome, DecrementOutcome::Applied { remaining: 0 });
        let meal = MealReader::get_meal(&conn, 2).unwrap();
        assert_eq!(meal.total, 2);
        assert_eq!(meal.portions, Some(Portions::new(2, 0)));

        let outcome = MealWriter::decrement_person(&conn, 2, Person::Second).unwrap();
        assert_eq!(outcome, DecrementOutcome::AlreadyEmpty);
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().total, 2);
    }

    #[test]
    fn test_decrement_unknown_row() {
        let conn = setup_store();
        let err = MealWriter::decrement_total(&conn, 5).unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound(5)));
    }

    #[test]
    fn test_save_assignments_requires_full_split() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Beef Lasagne", 4, None);
        seed_meal(&conn, 3, "Tacos", 2, None);

        let err = MealWriter::save_assignments(&conn, &[(2, Portions::new(2, 2)), (3, Portions::new(2, 1))])
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        // Nothing from the failed batch is kept
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().portions, None);

        MealWriter::save_assignments(&conn, &[(2, Portions::new(3, 1)), (3, Portions::new(0, 2))]).unwrap();
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().portions, Some(Portions::new(3, 1)));
        assert_eq!(MealReader::get_meal(&conn, 3).unwrap().portions, Some(Portions::new(0, 2)));
    }

    #[test]
    fn test_delete_and_shift_moves_rows_up() {
        let conn = setup_store();
        seed_meal(&conn, 2, "A", 1, None);
        seed_meal(&conn, 3, "B", 1, None);
        seed_meal(&conn, 4, "C", 1, None);
        seed_meal(&conn, 5, "D", 1, None);

        let tx = conn.unchecked_transaction().unwrap();
        delete_and_shift(&tx, 3).unwrap();
        tx.commit().unwrap();
        assert_eq!(
            rows(&conn),
            vec![(2, "A".to_string(), 1), (3, "C".to_string(), 1), (4, "D".to_string(), 1)]
        );
    }

    #[test]
    fn test_replace_list_writes_from_first_row() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Old A", 1, None);
        seed_meal(&conn, 3, "Old B", 0, None);
        seed_meal(&conn, 4, "Old C", 2, None);

        MealWriter::replace_list(&conn, &[3, 4], &[("Tacos".to_string(), 1), ("Pizza".to_string(), 3)])
            .unwrap();
        assert_eq!(
            rows(&conn),
            vec![(2, "Tacos".to_string(), 1), (3, "Pizza".to_string(), 3)]
        );
    }

    #[test]
    fn test_replace_list_rejects_missing_row() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Keep", 1, None);

        let err = MealWriter::replace_list(&conn, &[7], &[("New".to_string(), 1)]).unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound(7)));
        assert_eq!(rows(&conn), vec![(2, "Keep".to_string(), 1)]);
    }

    #[test]
    fn test_merge_import_restocks_and_appends() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Chicken Pesto", 1, Some((1, 0)));
        MealWriter::set_eaten(&conn, 2, true).unwrap();

        let summary = MealWriter::merge_import(
            &conn,
            &[line("Chicken Pesto", 2), line("Beef Lasagne", 1), line("Beef Lasagne", 2)],
            Some("order-1"),
        )
        .unwrap();

        assert_eq!(summary, MergeSummary { restocked: 1, appended: 1 });
        let pesto = MealReader::get_meal(&conn, 2).unwrap();
        assert_eq!(pesto.total, 3);
        assert!(!pesto.eaten);
        // Imported stock is unassigned
        assert_eq!(pesto.unassigned(), 2);
        assert_eq!(rows(&conn)[1], (3, "Beef Lasagne".to_string(), 3));
        assert_eq!(MealReader::last_imported_message(&conn).unwrap().as_deref(), Some("order-1"));
    }

    #[test]
    fn test_every_write_moves_last_update_forward() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Tacos", 3, None);
        seed_meal(&conn, 3, "Chicken Pesto", 2, None);

        let stamp = |conn: &Connection| MealReader::last_update(conn).unwrap().unwrap();
        let mut stamps = Vec::new();

        MealWriter::decrement_total(&conn, 2).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::set_eaten(&conn, 2, true).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::append_meal(&conn, "Soup", 1).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::save_assignments(&conn, &[(3, Portions::new(1, 1))]).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::decrement_person(&conn, 3, Person::First).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::merge_import(&conn, &[line("Tacos", 2)], Some("order-9")).unwrap();
        stamps.push(stamp(&conn));
        MealWriter::replace_list(&conn, &[4], &[("Pizza".to_string(), 1)]).unwrap();
        stamps.push(stamp(&conn));

        for pair in stamps.windows(2) {
            assert!(pair[0] < pair[1], "{} is not before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_refused_writes_keep_last_update() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Tacos", 0, None);
        seed_meal(&conn, 3, "Soup", 2, None);
        MealWriter::set_eaten(&conn, 2, false).unwrap();
        let before = MealReader::last_update(&conn).unwrap();

        MealWriter::decrement_total(&conn, 2).unwrap();
        assert!(MealWriter::save_assignments(&conn, &[(3, Portions::new(1, 0))]).is_err());
        assert_eq!(MealReader::last_update(&conn).unwrap(), before);
    }

    #[test]
    fn test_merge_import_rejects_quantity_overflow() {
        let conn = setup_store();
        seed_meal(&conn, 2, "Tacos", 5, None);

        let err = MealWriter::merge_import(&conn, &[line("Tacos", u32::MAX)], None).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(MealReader::get_meal(&conn, 2).unwrap().total, 5);

        let err = MealWriter::merge_import(&conn, &[line("Soup", u32::MAX), line("Soup", 1)], None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(rows(&conn).len(), 1);
    }

    #[test]
    fn test_next_stamp_is_monotonic() {
        let now = Utc::now();
        let ahead = (now + Duration::seconds(5)).to_rfc3339_opts(SecondsFormat::Millis, true);
        let stamp = next_stamp(Some(&ahead), now);
        assert!(stamp > ahead);
        assert_eq!(next_stamp(None, now), now.to_rfc3339_opts(SecondsFormat::Millis, true));
    }
}
