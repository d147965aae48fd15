// src/cli/meals.rs
// Offline commands that work on the local store directly

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::meals::api::{EmailStatus, MealView};
use crate::meals::import::{self, ImportOutcome, MaildirInbox};
use crate::meals::store::checkpoint::checkpoint_database_file;
use crate::meals::store::{MealReader, StoreConnection};
use crate::settings::AppSettings;

use super::CliError;

fn open_store(settings: &AppSettings) -> Result<Connection, CliError> {
    let store = settings.store_config();
    println!("Opening: {}\n", store.db_path.display());
    Ok(StoreConnection::open(&store.db_path)?)
}

pub fn list(settings: &AppSettings) -> Result<(), CliError> {
    let conn = open_store(settings)?;
    let meals: Vec<MealView> = MealReader::list_meals(&conn)?
        .iter()
        .map(|meal| MealView::from_meal(meal, &settings.household))
        .collect();

    print!("{}", format_meals(&meals));
    if let Some(stamp) = MealReader::last_update(&conn)? {
        println!("\nLast update: {}", stamp);
    }
    Ok(())
}

pub fn format_meals(meals: &[MealView]) -> String {
    let mut out = format!("{:<5} {:<32} {:>5}  {:<20} {}\n", "Row", "Meal", "Qty", "Portions", "Eaten");
    out.push_str(&"-".repeat(72));
    out.push('\n');
    for meal in meals {
        let portions = meal
            .portions
            .as_ref()
            .map(|p| p.iter().map(|(name, qty)| format!("{}={}", name, qty)).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<5} {:<32} {:>5}  {:<20} {}\n",
            meal.row,
            meal.name,
            meal.total,
            portions,
            if meal.eaten { "yes" } else { "" }
        ));
    }
    out
}

pub fn import_file(settings: &AppSettings, path: &Path) -> Result<(), CliError> {
    let conn = open_store(settings)?;
    let outcome = import::import_file(path, &conn)?;
    match &outcome {
        ImportOutcome::Imported(summary) => {
            info!("Imported {}: {:?}", path.display(), summary);
            println!(
                "Restocked {} meal(s), added {} new meal(s).",
                summary.restocked, summary.appended
            );
        }
        other => println!("{}", other.reply().message.unwrap_or_default()),
    }
    // release the connection so the checkpoint can restart the WAL
    drop(conn);
    checkpoint_database_file(&settings.store_config().db_path)?;
    Ok(())
}

pub fn check_email(settings: &AppSettings) -> Result<(), CliError> {
    let conn = open_store(settings)?;
    let store = settings.store_config();
    let inbox = MaildirInbox::new(settings.inbox.resolved_path(&store), settings.inbox.filter());
    inbox.ensure_directories()?;

    let check = import::check_latest(&inbox, &conn)?;
    let text = match check.status {
        EmailStatus::NoNewEmail => "No new meal emails found.".to_string(),
        EmailStatus::NewEmailFound => "A new order confirmation is waiting.".to_string(),
        EmailStatus::ConfirmationNeeded => check.message.unwrap_or_default(),
    };
    println!("Inbox: {}\n{}", inbox.root().display(), text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_meals_lists_rows() {
        let meals = vec![
            MealView { row: 2, name: "Tacos".into(), total: 3, portions: None, eaten: false },
            MealView {
                row: 3,
                name: "Soup".into(),
                total: 2,
                portions: Some(BTreeMap::from([("jarryd".into(), 1), ("nathan".into(), 1)])),
                eaten: true,
            },
        ];
        let text = format_meals(&meals);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("2     Tacos"));
        assert!(lines[3].contains("jarryd=1 nathan=1"));
        assert!(lines[3].ends_with("yes"));
    }
}
