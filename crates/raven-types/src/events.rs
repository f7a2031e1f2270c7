use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MessageType, ReplySnapshot};

/// Full message detail carried by `message_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedMessageDetails {
    pub text: Option<String>,
    pub content: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub is_edited: u8,
    pub is_reply: bool,
    pub creation: DateTime<Utc>,
    pub owner: Uuid,
    pub modified_by: Uuid,
    pub modified: DateTime<Utc>,
    pub linked_message: Option<Uuid>,
    pub replied_message_details: Option<ReplySnapshot>,
    pub link_doctype: Option<String>,
    pub link_document: Option<String>,
    pub message_reactions: Option<serde_json::Value>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub file_thumbnail: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub name: Uuid,
}

/// Reduced message detail carried by `message_edited`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedMessageDetails {
    pub text: Option<String>,
    pub content: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub is_edited: u8,
    pub is_reply: bool,
    pub modified: DateTime<Utc>,
    pub linked_message: Option<Uuid>,
    pub replied_message_details: Option<ReplySnapshot>,
    pub link_doctype: Option<String>,
    pub link_document: Option<String>,
    pub message_reactions: Option<serde_json::Value>,
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    #[serde(rename = "ready")]
    Ready { user_id: Uuid, username: String },

    /// A message was inserted, or a non-edited message was saved again
    #[serde(rename = "message_created")]
    MessageCreated {
        channel_id: Uuid,
        sender: Uuid,
        message_id: Uuid,
        message_details: Box<CreatedMessageDetails>,
    },

    /// An edited message was saved
    #[serde(rename = "message_edited")]
    MessageEdited {
        channel_id: Uuid,
        sender: Uuid,
        message_id: Uuid,
        message_details: Box<EditedMessageDetails>,
    },

    #[serde(rename = "message_deleted")]
    MessageDeleted {
        channel_id: Uuid,
        sender: Uuid,
        message_id: Uuid,
    },

    /// Sent to every client so sidebars can refresh unread counts
    #[serde(rename = "raven:unread_channel_count_updated")]
    UnreadChannelCountUpdated {
        channel_id: Uuid,
        play_sound: bool,
        sent_by: Uuid,
    },
}

impl GatewayEvent {
    /// Returns the channel_id if this event is scoped to a specific channel.
    /// Events that return `None` are global and should be delivered to all clients.
    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreated { channel_id, .. } => Some(*channel_id),
            Self::MessageEdited { channel_id, .. } => Some(*channel_id),
            Self::MessageDeleted { channel_id, .. } => Some(*channel_id),
            // Ready and the unread count update are global
            _ => None,
        }
    }

    /// Wire name of the event, as used in the `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MessageCreated { .. } => "message_created",
            Self::MessageEdited { .. } => "message_edited",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::UnreadChannelCountUpdated { .. } => "raven:unread_channel_count_updated",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to events for specific channels.
    /// The server will only forward channel-scoped events
    /// for channels the client has subscribed to.
    Subscribe { channel_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_event_wire_shape() {
        let channel_id = Uuid::new_v4();
        let event = GatewayEvent::MessageDeleted {
            channel_id,
            sender: Uuid::nil(),
            message_id: Uuid::nil(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_deleted");
        assert_eq!(json["data"]["channel_id"], channel_id.to_string());
        assert_eq!(event.channel_id(), Some(channel_id));
    }

    #[test]
    fn unread_count_is_global() {
        let event = GatewayEvent::UnreadChannelCountUpdated {
            channel_id: Uuid::new_v4(),
            play_sound: true,
            sent_by: Uuid::new_v4(),
        };

        assert_eq!(event.channel_id(), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
    }

    #[test]
    fn subscribe_command_parses() {
        let raw = r#"{"type":"Subscribe","data":{"channel_ids":["00000000-0000-0000-0000-000000000001"]}}"#;
        match serde_json::from_str::<GatewayCommand>(raw).unwrap() {
            GatewayCommand::Subscribe { channel_ids } => assert_eq!(channel_ids.len(), 1),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
