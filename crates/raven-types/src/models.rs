use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp layout used in reply snapshots and SQLite rows.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Image => "Image",
            Self::File => "File",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" => Ok(Self::Text),
            "Image" => Ok(Self::Image),
            "File" => Ok(Self::File),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

/// Edit state of a message. The only transition is `Original -> Edited`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    Original,
    Edited,
}

impl EditState {
    pub fn is_edited(&self) -> bool {
        matches!(self, Self::Edited)
    }

    /// Move to `Edited`. Calling this on an already edited message is a no-op.
    pub fn mark_edited(&mut self) {
        *self = Self::Edited;
    }
}

impl From<bool> for EditState {
    fn from(edited: bool) -> Self {
        if edited { Self::Edited } else { Self::Original }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    Public,
    Private,
    Open,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Private => "Private",
            Self::Open => "Open",
        }
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Public" => Ok(Self::Public),
            "Private" => Ok(Self::Private),
            "Open" => Ok(Self::Open),
            other => Err(format!("unknown channel type: {}", other)),
        }
    }
}

/// Copy of the quoted message taken when a reply is first inserted.
/// Never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySnapshot {
    pub text: Option<String>,
    pub content: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub owner: Uuid,
    /// `YYYY-MM-DD HH:MM:SS`
    pub creation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user: Uuid,
}

/// A chat message as held by the lifecycle hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    /// Raw rich text (HTML) as sent by the client.
    pub text: Option<String>,
    /// Plain-text preview derived from `text`.
    pub content: Option<String>,
    /// Rich-text document tree (editor JSON).
    pub json: Option<serde_json::Value>,
    pub message_type: MessageType,
    pub file: Option<String>,
    pub file_thumbnail: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub edit_state: EditState,
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
    pub modified_by: Uuid,
}

impl Message {
    /// A fresh text message owned by `owner`, timestamps set to now.
    pub fn new(channel_id: Uuid, owner: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_id,
            text: None,
            content: None,
            json: None,
            message_type: MessageType::Text,
            file: None,
            file_thumbnail: None,
            image_width: None,
            image_height: None,
            thumbnail_width: None,
            thumbnail_height: None,
            edit_state: EditState::Original,
            is_reply: false,
            linked_message: None,
            replied_message_details: None,
            link_doctype: None,
            link_document: None,
            mentions: Vec::new(),
            message_reactions: None,
            owner,
            creation: now,
            modified: now,
            modified_by: owner,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edit_state.is_edited()
    }
}

/// Fields of a message read when building a reply snapshot.
#[derive(Debug, Clone)]
pub struct ReplySource {
    pub channel_id: Uuid,
    pub text: Option<String>,
    pub content: Option<String>,
    pub file: Option<String>,
    pub message_type: MessageType,
    pub owner: Uuid,
    pub creation: DateTime<Utc>,
}

impl From<&Message> for ReplySource {
    fn from(m: &Message) -> Self {
        Self {
            channel_id: m.channel_id,
            text: m.text.clone(),
            content: m.content.clone(),
            file: m.file.clone(),
            message_type: m.message_type,
            owner: m.owner,
            creation: m.creation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_state_is_one_way() {
        let mut state = EditState::default();
        assert!(!state.is_edited());

        state.mark_edited();
        assert!(state.is_edited());

        state.mark_edited();
        assert_eq!(state, EditState::Edited);
    }

    #[test]
    fn message_type_parses_known_names() {
        assert_eq!("Image".parse::<MessageType>().unwrap(), MessageType::Image);
        assert!("Video".parse::<MessageType>().is_err());
        assert_eq!(MessageType::File.to_string(), "File");
    }
}
