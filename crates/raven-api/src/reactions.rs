use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use raven_types::api::{Claims, ToggleReactionRequest};

use crate::error::{ApiError, Result, blocking};
use crate::messages::authorize_channel;
use crate::state::AppState;

pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path((channel_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse> {
    let emoji = req.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(ApiError::BadRequest("emoji must not be empty".into()));
    }

    let (added, message) = blocking(move || {
        authorize_channel(&state, channel_id, claims.sub)?;
        let in_channel = state
            .db
            .get_message(message_id)?
            .is_some_and(|m| m.channel_id == channel_id);
        if !in_channel {
            return Err(ApiError::NotFound);
        }
        Ok(state.lifecycle.toggle_reaction(message_id, claims.sub, &emoji)?)
    })
    .await?;

    Ok(Json(json!({
        "added": added,
        "message_reactions": message.message_reactions,
    })))
}
