// src/meals/store/mod.rs
//! # Sheet storage
//!
//! The meal sheet lives in a single SQLite file. Rows keep their spreadsheet
//! numbering in `row_index`; sheet-level values (the last update stamp and
//! the id of the last imported order email) live in `_Metadata`.
//!
//! Reads go through [`MealReader`], every mutation through [`MealWriter`].

pub mod checkpoint;
pub mod connection;
pub mod error;
pub mod reader;
pub mod schema;
pub mod writer;

mod test_helpers;

pub use connection::StoreConnection;
pub use error::{StoreError, StoreResult};
pub use reader::MealReader;
pub use writer::{DecrementOutcome, MealWriter, MergeSummary};

use std::path::PathBuf;

/// Database storage configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn default_path() -> PathBuf {
        let documents = directories_next::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        documents.join("MealTracker").join("meals.db")
    }

    pub fn new(db_path: Option<PathBuf>) -> Self {
        Self {
            db_path: db_path.unwrap_or_else(Self::default_path),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(None)
    }
}
