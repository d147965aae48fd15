// src/meals/import/mod.rs
//! Order confirmation import.
//!
//! The newest unread confirmation email in the inbox is parsed into order
//! lines and merged into the sheet: meals already on the sheet are restocked,
//! new ones are appended. The id of the imported message is remembered so a
//! second import of the same email can be confirmed first.

pub mod maildir;
pub mod order_email;

use std::path::Path;
use std::time::SystemTime;

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use super::api::{ActionReply, EmailCheck, EmailStatus};
use super::store::{MealReader, MealWriter, MergeSummary, StoreError};

pub use maildir::{InboxFilter, MaildirInbox};
pub use order_email::parse_order_lines;

/// One "<name> x<qty>" line of an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub name: String,
    pub qty: u32,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Malformed message: {0}")]
    Mime(#[from] mailparse::MailParseError),
    #[error("Message {0} not found in inbox")]
    MessageNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    NoNewEmail,
    NothingExtracted,
    Imported(MergeSummary),
}

impl ImportOutcome {
    pub fn reply(&self) -> ActionReply {
        match self {
            ImportOutcome::NoNewEmail => ActionReply::info("No new meal emails found."),
            ImportOutcome::NothingExtracted => {
                ActionReply::info("Found email, but could not extract any meals.")
            }
            ImportOutcome::Imported(_) => ActionReply::success_with("Meal list updated successfully."),
        }
    }
}

/// Compare the newest unread confirmation with the last imported one
pub fn check_latest(inbox: &MaildirInbox, conn: &Connection) -> Result<EmailCheck, ImportError> {
    let Some(latest) = inbox.latest_unread()? else {
        return Ok(EmailCheck { status: EmailStatus::NoNewEmail, message: None });
    };

    let last_imported = MealReader::last_imported_message(conn)?;
    if last_imported.as_deref().map(str::trim) == Some(latest.id.trim()) {
        Ok(EmailCheck {
            status: EmailStatus::ConfirmationNeeded,
            message: Some(
                "The newest unread email has already been imported. Do you want to import it again?"
                    .to_string(),
            ),
        })
    } else {
        Ok(EmailCheck { status: EmailStatus::NewEmailFound, message: None })
    }
}

/// Import the newest unread confirmation and mark it read
pub fn import_latest(inbox: &MaildirInbox, conn: &Connection) -> Result<ImportOutcome, ImportError> {
    let Some(message) = inbox.latest_unread()? else {
        return Ok(ImportOutcome::NoNewEmail);
    };

    let lines = parse_order_lines(&message.body);
    if lines.is_empty() {
        info!("Message {} has no order lines", message.id);
        return Ok(ImportOutcome::NothingExtracted);
    }

    let summary = MealWriter::merge_import(conn, &lines, Some(&message.id))?;
    inbox.mark_read(&message.id)?;
    Ok(ImportOutcome::Imported(summary))
}

/// Import a single message file, e.g. one saved from a mail client
pub fn import_file(path: &Path, conn: &Connection) -> Result<ImportOutcome, ImportError> {
    let message = maildir::read_message(path, SystemTime::now())?;
    let lines = parse_order_lines(&message.body);
    if lines.is_empty() {
        return Ok(ImportOutcome::NothingExtracted);
    }
    let summary = MealWriter::merge_import(conn, &lines, Some(&message.id))?;
    Ok(ImportOutcome::Imported(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::store::StoreConnection;
    use std::fs;

    const SENDER: &str = "team@mymusclechef.com.au";

    fn setup_inbox() -> (tempfile::TempDir, MaildirInbox) {
        let dir = tempfile::tempdir().unwrap();
        let inbox = MaildirInbox::new(dir.path(), InboxFilter::default());
        inbox.ensure_directories().unwrap();
        (dir, inbox)
    }

    fn deliver(dir: &Path, id: &str, body: &str) {
        fs::write(
            dir.join("new").join(id),
            format!("From: {}\nSubject: Order Confirmation\n\n{}", SENDER, body),
        )
        .unwrap();
    }

    #[test]
    fn test_check_latest_states() {
        let (dir, inbox) = setup_inbox();
        let conn = StoreConnection::open_in_memory().unwrap();

        assert_eq!(check_latest(&inbox, &conn).unwrap().status, EmailStatus::NoNewEmail);

        deliver(dir.path(), "order-7", "Tacos x2\n");
        assert_eq!(check_latest(&inbox, &conn).unwrap().status, EmailStatus::NewEmailFound);

        MealWriter::merge_import(&conn, &[OrderLine { name: "Tacos".into(), qty: 2 }], Some("order-7"))
            .unwrap();
        let check = check_latest(&inbox, &conn).unwrap();
        assert_eq!(check.status, EmailStatus::ConfirmationNeeded);
        assert!(check.message.is_some());
    }

    #[test]
    fn test_import_latest_merges_and_marks_read() {
        let (dir, inbox) = setup_inbox();
        let conn = StoreConnection::open_in_memory().unwrap();
        MealWriter::append_meal(&conn, "Tacos", 1).unwrap();
        deliver(dir.path(), "order-8", "ITEMS ORDERED\nTacos x2\nBeef Lasagne x1\nTOTAL x1\n");

        let outcome = import_latest(&inbox, &conn).unwrap();
        assert_eq!(outcome, ImportOutcome::Imported(MergeSummary { restocked: 1, appended: 1 }));
        assert_eq!(outcome.reply().message.as_deref(), Some("Meal list updated successfully."));

        let meals = MealReader::list_meals(&conn).unwrap();
        assert_eq!(meals[0].total, 3);
        assert_eq!(meals[1].name, "Beef Lasagne");
        assert!(dir.path().join("cur").join("order-8:2,S").exists());

        assert_eq!(import_latest(&inbox, &conn).unwrap(), ImportOutcome::NoNewEmail);
    }

    #[test]
    fn test_import_latest_without_meal_lines() {
        let (dir, inbox) = setup_inbox();
        let conn = StoreConnection::open_in_memory().unwrap();
        deliver(dir.path(), "order-9", "Your order has shipped.\n");

        let outcome = import_latest(&inbox, &conn).unwrap();
        assert_eq!(outcome, ImportOutcome::NothingExtracted);
        // left unread so it can be inspected
        assert!(dir.path().join("new").join("order-9").exists());
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confirmation.eml");
        fs::write(&path, format!("From: {}\nSubject: Order Confirmation\n\nSoup x4\n", SENDER)).unwrap();
        let conn = StoreConnection::open_in_memory().unwrap();

        let outcome = import_file(&path, &conn).unwrap();
        assert_eq!(outcome, ImportOutcome::Imported(MergeSummary { restocked: 0, appended: 1 }));
        assert_eq!(
            MealReader::last_imported_message(&conn).unwrap().as_deref(),
            Some("confirmation.eml")
        );
    }
}
