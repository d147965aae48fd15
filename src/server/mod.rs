// src/server/mod.rs
//! HTTP endpoint for the meal sheet.
//!
//! A single path serves every action: `GET /?action=<name>` for reads and
//! `POST /` with `{"action": ..., "payload": ...}` for writes. Replies are
//! JSON. The store is checkpointed every [`CHECKPOINT_INTERVAL`] and once
//! more on shutdown.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::meals::store::checkpoint::{checkpoint_database, spawn_periodic_checkpoint, CHECKPOINT_INTERVAL};
use crate::settings::AppSettings;

pub use error::{AppError, StartupError};
pub use state::AppState;

use routes::{get_handler, not_found, post_handler};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(get_handler).post(post_handler))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(settings: &AppSettings) -> Result<(), StartupError> {
    info!("Initializing state...");
    let state = AppState::open(settings)?;
    if let Some(path) = &state.db_path {
        info!("Meal store at {}", path.display());
    }
    info!("Watching inbox at {}", state.inbox.root().display());

    let checkpoints = spawn_periodic_checkpoint(state.conn.clone(), CHECKPOINT_INTERVAL);

    let address = format!("{}:{}", settings.server.bind, settings.server.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    checkpoints.abort();
    match state.conn.lock() {
        Ok(conn) => {
            if let Err(e) = checkpoint_database(&conn) {
                warn!("Final checkpoint failed: {}", e);
            }
        }
        Err(_) => warn!("Store lock poisoned, skipping final checkpoint"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
