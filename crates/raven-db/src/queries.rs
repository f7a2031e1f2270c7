use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use raven_types::models::{ChannelType, Mention, Message, MessageType, ReplySource};

use crate::Database;
use crate::models::{MESSAGE_COLUMNS, MessageRow, ReactionRow, format_timestamp, parse_timestamp, parse_uuid};

impl Database {
    // -- Channels --

    pub fn create_channel(&self, id: Uuid, name: &str, channel_type: ChannelType) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channels (id, name, type) VALUES (?1, ?2, ?3)",
                params![id.to_string(), name, channel_type.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn add_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                params![channel_id.to_string(), user_id.to_string()],
            )?;
            Ok(())
        })
    }

    pub fn get_channel_type(&self, id: Uuid) -> Result<Option<ChannelType>> {
        self.with_conn(|conn| query_channel_type(conn, id))
    }

    /// `None` when the channel does not exist. Private channels are readable
    /// by their members only.
    pub fn can_access_channel(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<bool>> {
        self.with_conn(|conn| channel_access(conn, channel_id, user_id))
    }

    /// The subset of `channel_ids` the user may receive events for.
    pub fn accessible_channels(&self, user_id: Uuid, channel_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut allowed = Vec::with_capacity(channel_ids.len());
            for &channel_id in channel_ids {
                if channel_access(conn, channel_id, user_id)? == Some(true) {
                    allowed.push(channel_id);
                }
            }
            Ok(allowed)
        })
    }

    pub fn last_visit(&self, channel_id: Uuid, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT last_visit FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id.to_string(), user_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            raw.as_deref().map(parse_timestamp).transpose()
        })
    }

    // -- Messages --

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Newest first, ties on `creation` broken by id. `before` is the oldest
    /// message of the previous page.
    pub fn get_messages(
        &self,
        channel_id: Uuid,
        limit: u32,
        before: Option<PageCursor>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| query_messages(conn, channel_id, limit, before))
    }

    // -- Reactions --

    pub fn get_reactions(&self, message_id: Uuid) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| query_reactions(conn, message_id))
    }
}

pub(crate) fn query_message(conn: &Connection, id: Uuid) -> Result<Option<Message>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], MessageRow::from_row)
        .optional()?;

    match row {
        Some(row) => {
            let mentions = query_mentions(conn, &row.id)?;
            Ok(Some(row.into_message(mentions)?))
        }
        None => Ok(None),
    }
}

/// Keyset paging position. Without an `id`, every message sharing the
/// boundary `creation` is skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub creation: DateTime<Utc>,
    pub id: Option<Uuid>,
}

impl From<&Message> for PageCursor {
    fn from(m: &Message) -> Self {
        Self {
            creation: m.creation,
            id: Some(m.id),
        }
    }
}

fn query_messages(
    conn: &Connection,
    channel_id: Uuid,
    limit: u32,
    before: Option<PageCursor>,
) -> Result<Vec<Message>> {
    let sql = format!(
        "SELECT {} FROM messages
         WHERE channel_id = ?1
           AND (?2 IS NULL OR creation < ?2 OR (creation = ?2 AND id < ?3))
         ORDER BY creation DESC, id DESC
         LIMIT ?4",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(
            params![
                channel_id.to_string(),
                before.map(|c| format_timestamp(&c.creation)),
                before.and_then(|c| c.id).map(|id| id.to_string()),
                limit
            ],
            MessageRow::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| {
            let mentions = query_mentions(conn, &row.id)?;
            row.into_message(mentions)
        })
        .collect()
}

pub(crate) fn query_message_channel(conn: &Connection, id: Uuid) -> Result<Option<Uuid>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT channel_id FROM messages WHERE id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn query_reply_source(conn: &Connection, id: Uuid) -> Result<Option<ReplySource>> {
    let row = conn
        .query_row(
            "SELECT channel_id, text, content, file, message_type, owner, creation
             FROM messages WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((channel_id, text, content, file, message_type, owner, creation)) = row else {
        return Ok(None);
    };

    Ok(Some(ReplySource {
        channel_id: parse_uuid(&channel_id)?,
        text,
        content,
        file,
        message_type: message_type.parse::<MessageType>().map_err(|e| anyhow::anyhow!(e))?,
        owner: parse_uuid(&owner)?,
        creation: parse_timestamp(&creation)?,
    }))
}

fn query_mentions(conn: &Connection, message_id: &str) -> Result<Vec<Mention>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM mentions WHERE message_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map([message_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    ids.iter()
        .map(|id| Ok(Mention { user: parse_uuid(id)? }))
        .collect()
}

pub(crate) fn insert_message(conn: &Connection, message: &Message) -> Result<()> {
    let sql = format!(
        "INSERT INTO messages ({}) VALUES
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        MESSAGE_COLUMNS
    );
    execute_message(conn, &sql, message)?;
    write_mentions(conn, message)
}

pub(crate) fn update_message(conn: &Connection, message: &Message) -> Result<()> {
    // Same placeholder numbering as the insert: ?1 is the id
    let assignments: Vec<String> = MESSAGE_COLUMNS
        .split(',')
        .map(str::trim)
        .enumerate()
        .skip(1)
        .map(|(i, column)| format!("{} = ?{}", column, i + 1))
        .collect();
    let sql = format!("UPDATE messages SET {} WHERE id = ?1", assignments.join(", "));

    if execute_message(conn, &sql, message)? == 0 {
        bail!("Message not found: {}", message.id);
    }
    write_mentions(conn, message)
}

fn execute_message(conn: &Connection, sql: &str, message: &Message) -> Result<usize> {
    let json = message.json.as_ref().map(|v| v.to_string());
    let snapshot = message
        .replied_message_details
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let reactions = message.message_reactions.as_ref().map(|v| v.to_string());

    let changed = conn.execute(
        sql,
        params![
            message.id.to_string(),
            message.channel_id.to_string(),
            message.text,
            message.content,
            json,
            message.message_type.as_str(),
            message.file,
            message.file_thumbnail,
            message.image_width,
            message.image_height,
            message.thumbnail_width,
            message.thumbnail_height,
            message.is_edited(),
            message.is_reply,
            message.linked_message.map(|id| id.to_string()),
            snapshot,
            message.link_doctype,
            message.link_document,
            reactions,
            message.owner.to_string(),
            format_timestamp(&message.creation),
            format_timestamp(&message.modified),
            message.modified_by.to_string(),
        ],
    )?;

    Ok(changed)
}

fn write_mentions(conn: &Connection, message: &Message) -> Result<()> {
    let id = message.id.to_string();
    conn.execute("DELETE FROM mentions WHERE message_id = ?1", [&id])?;

    let mut stmt =
        conn.prepare("INSERT INTO mentions (message_id, user_id, position) VALUES (?1, ?2, ?3)")?;
    for (position, mention) in message.mentions.iter().enumerate() {
        stmt.execute(params![id, mention.user.to_string(), position as i64])?;
    }
    Ok(())
}

pub(crate) fn delete_message(conn: &Connection, id: Uuid) -> Result<()> {
    let id = id.to_string();
    conn.execute("DELETE FROM mentions WHERE message_id = ?1", [&id])?;
    conn.execute("DELETE FROM messages WHERE id = ?1", [&id])?;
    Ok(())
}

pub(crate) fn delete_reactions(conn: &Connection, message_id: Uuid) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM reactions WHERE message_id = ?1",
        [message_id.to_string()],
    )?)
}

/// Toggle a reaction: removes if exists, inserts if not.
/// Returns `true` when the reaction was inserted.
pub(crate) fn toggle_reaction(
    conn: &Connection,
    message_id: Uuid,
    user_id: Uuid,
    emoji: &str,
) -> Result<bool> {
    let (mid, uid) = (message_id.to_string(), user_id.to_string());

    // Check if reaction already exists
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
            params![mid, uid, emoji],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_id) = existing {
        conn.execute("DELETE FROM reactions WHERE id = ?1", [&existing_id])?;
        Ok(false)
    } else {
        conn.execute(
            "INSERT INTO reactions (id, message_id, user_id, emoji) VALUES (?1, ?2, ?3, ?4)",
            params![Uuid::new_v4().to_string(), mid, uid, emoji],
        )?;
        Ok(true)
    }
}

pub(crate) fn query_reactions(conn: &Connection, message_id: Uuid) -> Result<Vec<ReactionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, message_id, user_id, emoji, created_at FROM reactions
         WHERE message_id = ?1 ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map([message_id.to_string()], |row| {
            Ok(ReactionRow {
                id: row.get(0)?,
                message_id: row.get(1)?,
                user_id: row.get(2)?,
                emoji: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub(crate) fn query_channel_type(conn: &Connection, channel_id: Uuid) -> Result<Option<ChannelType>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT type FROM channels WHERE id = ?1",
            [channel_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|t| t.parse::<ChannelType>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()
}

pub(crate) fn is_channel_member(conn: &Connection, channel_id: Uuid, user_id: Uuid) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM channel_members WHERE channel_id = ?1 AND user_id = ?2",
        params![channel_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn channel_access(conn: &Connection, channel_id: Uuid, user_id: Uuid) -> Result<Option<bool>> {
    match query_channel_type(conn, channel_id)? {
        None => Ok(None),
        Some(ChannelType::Private) => is_channel_member(conn, channel_id, user_id).map(Some),
        Some(_) => Ok(Some(true)),
    }
}

pub(crate) fn track_visit(
    conn: &Connection,
    channel_id: Uuid,
    user_id: Uuid,
    at: &DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO channel_members (channel_id, user_id, last_visit) VALUES (?1, ?2, ?3)
         ON CONFLICT(channel_id, user_id) DO UPDATE SET last_visit = excluded.last_visit",
        params![channel_id.to_string(), user_id.to_string(), format_timestamp(at)],
    )?;
    Ok(())
}

/// `CREATE INDEX IF NOT EXISTS` over the given messages columns.
pub(crate) fn ensure_message_index(conn: &Connection, columns: &[&str]) -> Result<()> {
    if columns.is_empty() {
        bail!("Index needs at least one column");
    }
    if let Some(bad) = columns
        .iter()
        .find(|c| c.is_empty() || !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
    {
        bail!("Invalid index column '{}'", bad);
    }

    let sql = format!(
        "CREATE INDEX IF NOT EXISTS idx_messages_{} ON messages({})",
        columns.join("_"),
        columns.join(", ")
    );
    conn.execute_batch(&sql)?;
    Ok(())
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
