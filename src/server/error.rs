// src/server/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::meals::api::ActionReply;
use crate::meals::import::ImportError;
use crate::meals::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid action")]
    InvalidAction,

    #[error("Invalid POST action")]
    InvalidPostAction,

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("An error occurred during import: {0}")]
    Import(#[from] ImportError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) | AppError::InvalidAction | AppError::InvalidPostAction => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(StoreError::RowNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Import(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        (status, Json(ActionReply::error(self.to_string()))).into_response()
    }
}

/// Errors that stop the server from starting
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
