// src/settings/mod.rs

pub mod io;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::meals::import::InboxFilter;
use crate::meals::store::StoreConfig;
use crate::meals::Household;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "0.0.0.0".to_string(), port: 8080 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InboxSettings {
    /// Maildir holding order confirmation emails
    pub path: Option<PathBuf>,
    pub sender: String,
    pub subject: String,
    pub max_age_days: u64,
}

impl Default for InboxSettings {
    fn default() -> Self {
        let filter = InboxFilter::default();
        Self {
            path: None,
            sender: filter.sender,
            subject: filter.subject,
            max_age_days: 14,
        }
    }
}

impl InboxSettings {
    pub fn filter(&self) -> InboxFilter {
        InboxFilter {
            sender: self.sender.clone(),
            subject: self.subject.clone(),
            max_age: Duration::from_secs(self.max_age_days * 24 * 60 * 60),
        }
    }

    /// Configured maildir, or `inbox/` next to the database
    pub fn resolved_path(&self, store: &StoreConfig) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            store
                .db_path
                .parent()
                .map(|p| p.join("inbox"))
                .unwrap_or_else(|| PathBuf::from("inbox"))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval_secs: u64,
    pub undo_window_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/".to_string(),
            poll_interval_secs: 60,
            undo_window_secs: 5,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_secs(self.undo_window_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub database_path: Option<PathBuf>,
    pub household: Household,
    pub server: ServerSettings,
    pub inbox: InboxSettings,
    pub client: ClientSettings,
}

impl AppSettings {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.database_path.clone())
    }
}
