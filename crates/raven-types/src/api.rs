use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Mention, Message, MessageType, ReplySnapshot};

// -- JWT Claims --

/// JWT claims shared across raven-api (REST middleware) and raven-gateway
/// (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    pub json: Option<serde_json::Value>,
    #[serde(default)]
    pub message_type: MessageType,
    pub file: Option<String>,
    pub file_thumbnail: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    #[serde(default)]
    pub is_reply: bool,
    pub linked_message: Option<Uuid>,
    pub link_doctype: Option<String>,
    pub link_document: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub text: String,
    pub json: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub text: Option<String>,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub file: Option<String>,
    pub file_thumbnail: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub is_edited: bool,
    pub is_reply: bool,
    pub linked_message: Option<Uuid>,
    pub replied_message_details: Option<ReplySnapshot>,
    pub link_doctype: Option<String>,
    pub link_document: Option<String>,
    pub mentions: Vec<Mention>,
    pub message_reactions: Option<serde_json::Value>,
    pub owner: Uuid,
    pub creation: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            is_edited: m.is_edited(),
            id: m.id,
            channel_id: m.channel_id,
            text: m.text,
            content: m.content,
            message_type: m.message_type,
            file: m.file,
            file_thumbnail: m.file_thumbnail,
            image_width: m.image_width,
            image_height: m.image_height,
            thumbnail_width: m.thumbnail_width,
            thumbnail_height: m.thumbnail_height,
            is_reply: m.is_reply,
            linked_message: m.linked_message,
            replied_message_details: m.replied_message_details,
            link_doctype: m.link_doctype,
            link_document: m.link_document,
            mentions: m.mentions,
            message_reactions: m.message_reactions,
            owner: m.owner,
            creation: m.creation,
            modified: m.modified,
        }
    }
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

/// One entry of a message's `message_reactions` aggregate, keyed by emoji.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub reaction: String,
    pub count: usize,
    pub users: Vec<Uuid>,
}
