// src/server/state.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use super::error::{AppError, StartupError};
use crate::meals::import::MaildirInbox;
use crate::meals::store::StoreConnection;
use crate::meals::Household;
use crate::settings::AppSettings;

pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub inbox: MaildirInbox,
    pub household: Household,
    pub db_path: Option<PathBuf>,
}

impl AppState {
    pub fn open(settings: &AppSettings) -> Result<Arc<Self>, StartupError> {
        let store = settings.store_config();
        let conn = StoreConnection::open(&store.db_path)?;

        let inbox = MaildirInbox::new(settings.inbox.resolved_path(&store), settings.inbox.filter());
        inbox.ensure_directories()?;

        Ok(Arc::new(Self {
            conn: Arc::new(Mutex::new(conn)),
            inbox,
            household: settings.household.clone(),
            db_path: Some(store.db_path),
        }))
    }

    /// State over an already open connection (tests, in-memory sheets)
    pub fn with_connection(conn: Connection, inbox: MaildirInbox, household: Household) -> Arc<Self> {
        Arc::new(Self {
            conn: Arc::new(Mutex::new(conn)),
            inbox,
            household,
            db_path: None,
        })
    }

    pub fn lock_store(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::InternalError("store lock poisoned".to_string()))
    }
}
