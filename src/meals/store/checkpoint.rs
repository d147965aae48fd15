// src/meals/store/checkpoint.rs
//! WAL checkpoint management.
//!
//! With `PRAGMA synchronous=NORMAL` committed writes can sit in the WAL file
//! for a while before they reach the main database file. The server forces a
//! checkpoint:
//! - on shutdown (most critical)
//! - periodically every 30 seconds while serving

use super::error::StoreResult;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

pub const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(30);

/// Force a WAL checkpoint so pending changes land in the main database file
pub fn checkpoint_database(conn: &Connection) -> StoreResult<()> {
    // RESTART mode: checkpoint and restart the WAL file
    // the pragma reports (busy, log frames, checkpointed frames)
    conn.query_row("PRAGMA wal_checkpoint(RESTART)", [], |_| Ok(()))?;
    trace!("WAL checkpoint completed");
    Ok(())
}

/// Checkpoint a database file by path, once nothing else holds it open
pub fn checkpoint_database_file(db_path: &Path) -> StoreResult<()> {
    if !db_path.exists() {
        return Ok(()); // Nothing to checkpoint
    }

    let conn = Connection::open(db_path)?;
    checkpoint_database(&conn)?;
    info!("Checkpointed database: {:?}", db_path.file_name());
    Ok(())
}

/// Periodic checkpoint task for a shared connection
pub fn spawn_periodic_checkpoint(conn: Arc<Mutex<Connection>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let conn = conn.clone();
            let result = tokio::task::spawn_blocking(move || match conn.lock() {
                Ok(guard) => checkpoint_database(&guard),
                Err(poisoned) => checkpoint_database(&poisoned.into_inner()),
            })
            .await;

            match result {
                Ok(Ok(())) => trace!("Periodic checkpoint completed"),
                Ok(Err(e)) => warn!("Periodic checkpoint failed: {}", e),
                Err(e) => error!("Periodic checkpoint task panicked: {}", e),
            }
        }
    })
}
