//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the raven-types models to keep the DB layer independent.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use raven_types::models::{DATETIME_FORMAT, EditState, Mention, Message, MessageType, ReplySnapshot};

/// Column list matching [`MessageRow::from_row`].
pub const MESSAGE_COLUMNS: &str = "id, channel_id, text, content, json, message_type, file, \
     file_thumbnail, image_width, image_height, thumbnail_width, thumbnail_height, is_edited, \
     is_reply, linked_message, replied_message_details, link_doctype, link_document, \
     message_reactions, owner, creation, modified, modified_by";

pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub text: Option<String>,
    pub content: Option<String>,
    pub json: Option<String>,
    pub message_type: String,
    pub file: Option<String>,
    pub file_thumbnail: Option<String>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub is_edited: bool,
    pub is_reply: bool,
    pub linked_message: Option<String>,
    pub replied_message_details: Option<String>,
    pub link_doctype: Option<String>,
    pub link_document: Option<String>,
    pub message_reactions: Option<String>,
    pub owner: String,
    pub creation: String,
    pub modified: String,
    pub modified_by: String,
}

impl MessageRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            channel_id: row.get(1)?,
            text: row.get(2)?,
            content: row.get(3)?,
            json: row.get(4)?,
            message_type: row.get(5)?,
            file: row.get(6)?,
            file_thumbnail: row.get(7)?,
            image_width: row.get(8)?,
            image_height: row.get(9)?,
            thumbnail_width: row.get(10)?,
            thumbnail_height: row.get(11)?,
            is_edited: row.get(12)?,
            is_reply: row.get(13)?,
            linked_message: row.get(14)?,
            replied_message_details: row.get(15)?,
            link_doctype: row.get(16)?,
            link_document: row.get(17)?,
            message_reactions: row.get(18)?,
            owner: row.get(19)?,
            creation: row.get(20)?,
            modified: row.get(21)?,
            modified_by: row.get(22)?,
        })
    }

    pub fn into_message(self, mentions: Vec<Mention>) -> Result<Message> {
        let replied_message_details = self
            .replied_message_details
            .as_deref()
            .map(serde_json::from_str::<ReplySnapshot>)
            .transpose()
            .with_context(|| format!("Corrupt reply snapshot on message '{}'", self.id))?;

        Ok(Message {
            id: parse_uuid(&self.id)?,
            channel_id: parse_uuid(&self.channel_id)?,
            text: self.text,
            content: self.content,
            json: parse_json(self.json.as_deref()),
            message_type: self.message_type.parse::<MessageType>().map_err(|e| anyhow!(e))?,
            file: self.file,
            file_thumbnail: self.file_thumbnail,
            image_width: self.image_width,
            image_height: self.image_height,
            thumbnail_width: self.thumbnail_width,
            thumbnail_height: self.thumbnail_height,
            edit_state: EditState::from(self.is_edited),
            is_reply: self.is_reply,
            linked_message: self.linked_message.as_deref().map(parse_uuid).transpose()?,
            replied_message_details,
            link_doctype: self.link_doctype,
            link_document: self.link_document,
            mentions,
            message_reactions: parse_json(self.message_reactions.as_deref()),
            owner: parse_uuid(&self.owner)?,
            creation: parse_timestamp(&self.creation)?,
            modified: parse_timestamp(&self.modified)?,
            modified_by: parse_uuid(&self.modified_by)?,
        })
    }
}

pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt uuid '{}'", raw))
}

/// Free-form JSON columns. Unparseable values read as absent.
fn parse_json(raw: Option<&str>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(s).ok())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone. Parse as naive UTC.
            NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}
