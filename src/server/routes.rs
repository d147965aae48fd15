// src/server/routes.rs

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::AppError;
use super::state::AppState;
use crate::meals::api::{
    self, ActionReply, Assignment, GetParams, LastUpdate, MealStatusPayload, MealView, NewListPayload,
    PersonPayload, PostRequest, RowPayload,
};
use crate::meals::import;
use crate::meals::store::{DecrementOutcome, MealReader, MealWriter, StoreError};

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetParams>,
) -> Result<Response, AppError> {
    let value = run_blocking(state, move |state| dispatch_get(state, params.action.as_deref())).await?;
    Ok(Json(value).into_response())
}

/// Body is parsed by hand: web clients often post JSON as text/plain to skip the CORS preflight.
pub async fn post_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, AppError> {
    let request: PostRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))?;
    let value = run_blocking(state, move |state| dispatch_post(state, &request)).await?;
    Ok(Json(value).into_response())
}

async fn run_blocking<F>(state: Arc<AppState>, f: F) -> Result<Value, AppError>
where
    F: FnOnce(&AppState) -> Result<Value, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| AppError::InternalError(format!("handler task failed: {}", e)))?
}

pub fn dispatch_get(state: &AppState, action: Option<&str>) -> Result<Value, AppError> {
    debug!("GET action {:?}", action);
    let value = match action {
        None | Some("") => to_value(ActionReply::success_with("API is reachable."))?,
        Some(api::GET_MEALS) => {
            let conn = state.lock_store()?;
            let meals: Vec<MealView> = MealReader::list_meals(&conn)?
                .iter()
                .map(|meal| MealView::from_meal(meal, &state.household))
                .collect();
            to_value(meals)?
        }
        Some(api::CHECK_LAST_EMAIL) => {
            let conn = state.lock_store()?;
            to_value(import::check_latest(&state.inbox, &conn)?)?
        }
        Some(api::IMPORT_FROM_GMAIL) => {
            let conn = state.lock_store()?;
            let outcome = import::import_latest(&state.inbox, &conn)?;
            info!("Inbox import: {:?}", outcome);
            to_value(outcome.reply())?
        }
        Some(api::GET_LAST_UPDATE) => {
            let conn = state.lock_store()?;
            to_value(LastUpdate { last_update: MealReader::last_update(&conn)? })?
        }
        Some(_) => return Err(AppError::InvalidAction),
    };
    Ok(value)
}

pub fn dispatch_post(state: &AppState, request: &PostRequest) -> Result<Value, AppError> {
    debug!("POST action {}", request.action);
    let reply = match request.action.as_str() {
        api::DECREMENT_QTY => {
            let payload: RowPayload = payload(request)?;
            let conn = state.lock_store()?;
            decrement_reply(MealWriter::decrement_total(&conn, payload.row)?)
        }
        api::DECREMENT_PERSON_QTY => {
            let payload: PersonPayload = payload(request)?;
            let person = state.household.person(&payload.person).ok_or_else(|| {
                StoreError::Invalid(format!("Unknown person '{}'", payload.person))
            })?;
            let conn = state.lock_store()?;
            decrement_reply(MealWriter::decrement_person(&conn, payload.row, person)?)
        }
        api::SAVE_ASSIGNMENTS => {
            let assignments: Vec<Assignment> = payload(request)?;
            let resolved = assignments
                .iter()
                .map(|a| a.resolve(&state.household).map(|portions| (a.row, portions)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(StoreError::Invalid)?;
            let conn = state.lock_store()?;
            MealWriter::save_assignments(&conn, &resolved)?;
            ActionReply::success_with("Assignments saved!")
        }
        api::UPLOAD_NEW_LIST => {
            let payload: NewListPayload = payload(request)?;
            let new_meals: Vec<(String, u32)> = payload
                .new_meals
                .iter()
                .map(|m| (m.name().to_string(), m.qty()))
                .collect();
            let conn = state.lock_store()?;
            MealWriter::replace_list(&conn, &payload.meals_to_delete, &new_meals)?;
            ActionReply::success_with("New list uploaded.")
        }
        api::UPDATE_MEAL_STATUS => {
            let payload: MealStatusPayload = payload(request)?;
            let conn = state.lock_store()?;
            MealWriter::set_eaten(&conn, payload.row, payload.eaten)?;
            ActionReply::success_with("Meal status updated.")
        }
        _ => return Err(AppError::InvalidPostAction),
    };
    to_value(reply)
}

fn decrement_reply(outcome: DecrementOutcome) -> ActionReply {
    match outcome {
        DecrementOutcome::Applied { .. } => ActionReply::success(),
        DecrementOutcome::AlreadyEmpty => ActionReply::info("Quantity already at 0."),
        DecrementOutcome::Assigned => {
            ActionReply::info("All remaining portions are assigned. Take one from a person instead.")
        }
    }
}

fn payload<T: DeserializeOwned>(request: &PostRequest) -> Result<T, AppError> {
    serde_json::from_value(request.payload.clone()).map_err(|e| {
        AppError::MalformedPayload(format!("{} payload: {}", request.action, e))
    })
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::InternalError(e.to_string()))
}

/// Fallback for unknown paths, answered in the endpoint's own error format
pub async fn not_found() -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({"status": "error", "message": "Not found"})),
    )
}
