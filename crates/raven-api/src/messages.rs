use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use raven_db::queries::PageCursor;
use raven_types::api::{Claims, EditMessageRequest, MessageResponse, SendMessageRequest};
use raven_types::models::Message;

use crate::error::{ApiError, Result, blocking};
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: the `creation` of the oldest message of the previous page.
    pub before: Option<DateTime<Utc>>,
    /// That message's id, so messages sharing its `creation` are not skipped.
    pub before_id: Option<Uuid>,
}

impl MessageQuery {
    fn cursor(&self) -> Option<PageCursor> {
        self.before.map(|creation| PageCursor {
            creation,
            id: self.before_id,
        })
    }
}

fn default_limit() -> u32 {
    50
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let mut message = Message::new(channel_id, claims.sub);
    message.text = req.text;
    message.json = req.json;
    message.message_type = req.message_type;
    message.file = req.file;
    message.file_thumbnail = req.file_thumbnail;
    message.image_width = req.image_width;
    message.image_height = req.image_height;
    message.thumbnail_width = req.thumbnail_width;
    message.thumbnail_height = req.thumbnail_height;
    message.is_reply = req.is_reply;
    message.linked_message = req.linked_message;
    message.link_doctype = req.link_doctype;
    message.link_document = req.link_document;

    let saved = blocking(move || {
        authorize_channel(&state, channel_id, claims.sub)?;
        Ok(state.lifecycle.insert(message, claims.sub)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(saved))))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.min(MAX_PAGE_SIZE);

    let messages = blocking(move || {
        authorize_channel(&state, channel_id, claims.sub)?;
        Ok(state.db.get_messages(channel_id, limit, query.cursor())?)
    })
    .await?;

    let messages: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(messages))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse> {
    let saved = blocking(move || {
        authorize_owner(&state, channel_id, message_id, claims.sub)?;

        Ok(state.lifecycle.update(message_id, claims.sub, |m| {
            m.text = Some(req.text);
            m.json = req.json;
        })?)
    })
    .await?;

    Ok(Json(MessageResponse::from(saved)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    blocking(move || {
        authorize_owner(&state, channel_id, message_id, claims.sub)?;
        state.lifecycle.delete(message_id, claims.sub)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Private channels are closed to non-members.
pub(crate) fn authorize_channel(state: &AppState, channel_id: Uuid, user_id: Uuid) -> Result<()> {
    match state.db.can_access_channel(channel_id, user_id)? {
        None => Err(ApiError::NotFound),
        Some(false) => Err(ApiError::Forbidden),
        Some(true) => Ok(()),
    }
}

/// Only the sender may edit or delete a message, and only through the
/// channel it was posted in.
fn authorize_owner(state: &AppState, channel_id: Uuid, message_id: Uuid, user_id: Uuid) -> Result<()> {
    let message = state
        .db
        .get_message(message_id)?
        .filter(|m| m.channel_id == channel_id)
        .ok_or(ApiError::NotFound)?;

    if message.owner != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}
