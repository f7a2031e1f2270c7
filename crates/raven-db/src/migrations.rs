use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Id of the channel every fresh database starts with.
pub const GENERAL_CHANNEL_ID: &str = "00000000-0000-0000-0000-000000000001";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            type        TEXT NOT NULL DEFAULT 'Public',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channel_members (
            channel_id  TEXT NOT NULL REFERENCES channels(id),
            user_id     TEXT NOT NULL,
            last_visit  TEXT,
            PRIMARY KEY (channel_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id                      TEXT PRIMARY KEY,
            channel_id              TEXT NOT NULL REFERENCES channels(id),
            text                    TEXT,
            content                 TEXT,
            json                    TEXT,
            message_type            TEXT NOT NULL DEFAULT 'Text',
            file                    TEXT,
            file_thumbnail          TEXT,
            image_width             INTEGER,
            image_height            INTEGER,
            thumbnail_width         INTEGER,
            thumbnail_height        INTEGER,
            is_edited               INTEGER NOT NULL DEFAULT 0,
            is_reply                INTEGER NOT NULL DEFAULT 0,
            linked_message          TEXT,
            replied_message_details TEXT,
            link_doctype            TEXT,
            link_document           TEXT,
            message_reactions       TEXT,
            owner                   TEXT NOT NULL,
            creation                TEXT NOT NULL,
            modified                TEXT NOT NULL,
            modified_by             TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mentions (
            message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL,
            position    INTEGER NOT NULL,
            PRIMARY KEY (message_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            message_id  TEXT NOT NULL REFERENCES messages(id),
            user_id     TEXT NOT NULL,
            emoji       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            UNIQUE(message_id, user_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        -- Seed the default general channel
        INSERT OR IGNORE INTO channels (id, name)
            VALUES ('00000000-0000-0000-0000-000000000001', 'general');
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
