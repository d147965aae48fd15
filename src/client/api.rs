// src/client/api.rs

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::meals::api::{
    self, ActionReply, Assignment, EmailCheck, LastUpdate, MealStatusPayload, MealView, NewListPayload,
    PersonPayload, ReplyStatus, RowPayload,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
}

/// One method per endpoint action.
#[async_trait]
pub trait MealApi: Send + Sync {
    async fn get_meals(&self) -> Result<Vec<MealView>, ApiError>;
    async fn get_last_update(&self) -> Result<Option<String>, ApiError>;
    async fn check_last_email(&self) -> Result<EmailCheck, ApiError>;
    async fn import_from_inbox(&self) -> Result<ActionReply, ApiError>;
    async fn decrement_qty(&self, row: u32) -> Result<ActionReply, ApiError>;
    async fn decrement_person_qty(&self, row: u32, person: &str) -> Result<ActionReply, ApiError>;
    async fn save_assignments(&self, assignments: &[Assignment]) -> Result<ActionReply, ApiError>;
    async fn upload_new_list(&self, list: &NewListPayload) -> Result<ActionReply, ApiError>;
    async fn update_meal_status(&self, row: u32, eaten: bool) -> Result<ActionReply, ApiError>;
}

#[derive(Clone)]
pub struct HttpMealApi {
    client: Client,
    base_url: String,
}

impl HttpMealApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    async fn get<T: DeserializeOwned>(&self, action: &str) -> Result<T, ApiError> {
        debug!("GET {} action={}", self.base_url, action);
        let response = self.client.get(&self.base_url).query(&[("action", action)]).send().await?;
        read_reply(response).await
    }

    /// Bodies go out as text/plain, the same as a browser client avoiding a preflight.
    async fn post<P: Serialize + Sync>(&self, action: &str, payload: &P) -> Result<ActionReply, ApiError> {
        debug!("POST {} action={}", self.base_url, action);
        let body = serde_json::to_vec(&Outgoing { action, payload })?;
        let response = self
            .client
            .post(&self.base_url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;
        read_reply(response).await
    }
}

#[derive(Serialize)]
struct Outgoing<'a, P> {
    action: &'a str,
    payload: &'a P,
}

async fn read_reply<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    trace!("reply {}: {}", status, body);

    if let Ok(reply) = serde_json::from_str::<ActionReply>(&body) {
        if reply.status == ReplyStatus::Error {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: reply.message.unwrap_or_else(|| "Unknown server error".to_string()),
            });
        }
    }
    if !status.is_success() {
        return Err(ApiError::Server { status: status.as_u16(), message: body });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl MealApi for HttpMealApi {
    async fn get_meals(&self) -> Result<Vec<MealView>, ApiError> {
        self.get(api::GET_MEALS).await
    }

    async fn get_last_update(&self) -> Result<Option<String>, ApiError> {
        let reply: LastUpdate = self.get(api::GET_LAST_UPDATE).await?;
        Ok(reply.last_update)
    }

    async fn check_last_email(&self) -> Result<EmailCheck, ApiError> {
        self.get(api::CHECK_LAST_EMAIL).await
    }

    async fn import_from_inbox(&self) -> Result<ActionReply, ApiError> {
        self.get(api::IMPORT_FROM_GMAIL).await
    }

    async fn decrement_qty(&self, row: u32) -> Result<ActionReply, ApiError> {
        self.post(api::DECREMENT_QTY, &RowPayload { row }).await
    }

    async fn decrement_person_qty(&self, row: u32, person: &str) -> Result<ActionReply, ApiError> {
        let payload = PersonPayload { row, person: person.to_string() };
        self.post(api::DECREMENT_PERSON_QTY, &payload).await
    }

    async fn save_assignments(&self, assignments: &[Assignment]) -> Result<ActionReply, ApiError> {
        self.post(api::SAVE_ASSIGNMENTS, &assignments).await
    }

    async fn upload_new_list(&self, list: &NewListPayload) -> Result<ActionReply, ApiError> {
        self.post(api::UPLOAD_NEW_LIST, list).await
    }

    async fn update_meal_status(&self, row: u32, eaten: bool) -> Result<ActionReply, ApiError> {
        self.post(api::UPDATE_MEAL_STATUS, &MealStatusPayload { row, eaten }).await
    }
}
