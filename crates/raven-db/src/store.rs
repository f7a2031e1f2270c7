//! SQLite implementation of the message lifecycle storage port.

use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use uuid::Uuid;

use raven_messaging::error::Result as HookResult;
use raven_messaging::ports::{MessageStore, MessageTx};
use raven_types::models::{ChannelType, Message, ReplySource};

use crate::Database;
use crate::models::parse_uuid;
use crate::queries;

/// One write transaction. Dropping it without commit rolls back.
pub struct SqliteTx<'conn> {
    tx: Transaction<'conn>,
}

impl MessageTx for SqliteTx<'_> {
    fn get_message(&self, id: Uuid) -> HookResult<Option<Message>> {
        Ok(queries::query_message(&self.tx, id)?)
    }

    fn message_channel(&self, id: Uuid) -> HookResult<Option<Uuid>> {
        Ok(queries::query_message_channel(&self.tx, id)?)
    }

    fn reply_source(&self, id: Uuid) -> HookResult<Option<ReplySource>> {
        Ok(queries::query_reply_source(&self.tx, id)?)
    }

    fn insert_message(&mut self, message: &Message) -> HookResult<()> {
        Ok(queries::insert_message(&self.tx, message)?)
    }

    fn update_message(&mut self, message: &Message) -> HookResult<()> {
        Ok(queries::update_message(&self.tx, message)?)
    }

    fn delete_message(&mut self, id: Uuid) -> HookResult<()> {
        Ok(queries::delete_message(&self.tx, id)?)
    }

    fn delete_reactions(&mut self, message_id: Uuid) -> HookResult<usize> {
        Ok(queries::delete_reactions(&self.tx, message_id)?)
    }

    fn toggle_reaction(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> HookResult<bool> {
        Ok(queries::toggle_reaction(&self.tx, message_id, user_id, emoji)?)
    }

    fn reactions(&self, message_id: Uuid) -> HookResult<Vec<(Uuid, String)>> {
        let rows = queries::query_reactions(&self.tx, message_id)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((parse_uuid(&row.user_id)?, row.emoji));
        }
        Ok(out)
    }

    fn channel_type(&self, channel_id: Uuid) -> HookResult<Option<ChannelType>> {
        Ok(queries::query_channel_type(&self.tx, channel_id)?)
    }

    fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> HookResult<bool> {
        Ok(queries::is_channel_member(&self.tx, channel_id, user_id)?)
    }

    fn track_visit(&mut self, channel_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> HookResult<()> {
        Ok(queries::track_visit(&self.tx, channel_id, user_id, &at)?)
    }
}

impl MessageStore for Database {
    fn transaction<T, F>(&self, f: F) -> HookResult<T>
    where
        F: FnOnce(&mut dyn MessageTx) -> HookResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(anyhow::Error::from)?;

        let mut sqlite_tx = SqliteTx { tx };
        let value = f(&mut sqlite_tx)?;
        sqlite_tx.tx.commit().map_err(anyhow::Error::from)?;

        Ok(value)
    }

    fn ensure_index(&self, columns: &[&str]) -> HookResult<()> {
        Ok(self.with_conn(|conn| queries::ensure_message_index(conn, columns))?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use raven_messaging::{HookError, MessageLifecycle, PublishError, RealtimePort};
    use raven_messaging::ports::{NotificationPort, NotifyError};
    use raven_types::events::GatewayEvent;

    use super::*;
    use crate::migrations::GENERAL_CHANNEL_ID;
    use crate::queries::PageCursor;

    struct NullRealtime {
        fail: bool,
    }

    impl RealtimePort for NullRealtime {
        fn publish(&self, _event: GatewayEvent) -> Result<(), PublishError> {
            if self.fail { Err(PublishError::Closed) } else { Ok(()) }
        }
    }

    struct NoPush;

    impl NotificationPort for NoPush {
        fn is_enabled(&self) -> Result<bool, NotifyError> {
            Err(NotifyError::Unsupported)
        }

        fn send_notification_to_user(&self, _: Uuid, _: &str, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Unsupported)
        }
    }

    fn lifecycle(fail_publish: bool) -> MessageLifecycle<Arc<Database>> {
        let db = Arc::new(Database::open_in_memory().unwrap());
        MessageLifecycle::new(db, Arc::new(NullRealtime { fail: fail_publish }), Arc::new(NoPush))
    }

    fn general() -> Uuid {
        GENERAL_CHANNEL_ID.parse().unwrap()
    }

    #[test]
    fn message_round_trips_through_sqlite() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let mentioned = Uuid::new_v4();
        let mut message = Message::new(general(), owner);
        message.text = Some("<p>hello</p>".into());
        message.json = Some(json!({
            "type": "doc",
            "content": [{ "type": "paragraph", "content": [
                { "type": "userMention", "attrs": { "id": mentioned.to_string() } }
            ]}]
        }));
        message.image_width = Some(640);

        let saved = lifecycle.insert(message, owner).unwrap();
        let loaded = lifecycle.store().get_message(saved.id).unwrap().unwrap();

        assert_eq!(loaded.content.as_deref(), Some("hello"));
        assert_eq!(loaded.mentions, saved.mentions);
        assert_eq!(loaded.mentions[0].user, mentioned);
        assert_eq!(loaded.image_width, Some(640));
        assert_eq!(loaded.creation.timestamp_micros(), saved.creation.timestamp_micros());
        assert!(lifecycle.store().last_visit(general(), owner).unwrap().is_some());
    }

    #[test]
    fn edit_and_reply_snapshot_persist() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let mut quoted = Message::new(general(), owner);
        quoted.text = Some("first".into());
        let quoted = lifecycle.insert(quoted, owner).unwrap();

        let mut reply = Message::new(general(), owner);
        reply.is_reply = true;
        reply.linked_message = Some(quoted.id);
        let reply = lifecycle.insert(reply, owner).unwrap();

        lifecycle
            .update(quoted.id, owner, |m| m.text = Some("second".into()))
            .unwrap();

        let quoted = lifecycle.store().get_message(quoted.id).unwrap().unwrap();
        let reply = lifecycle.store().get_message(reply.id).unwrap().unwrap();
        assert!(quoted.is_edited());
        let snapshot = reply.replied_message_details.unwrap();
        assert_eq!(snapshot.text.as_deref(), Some("first"));
        assert_eq!(snapshot.creation.len(), "YYYY-MM-DD HH:MM:SS".len());
    }

    #[test]
    fn delete_cascades_reactions() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let saved = lifecycle.insert(Message::new(general(), owner), owner).unwrap();
        lifecycle.toggle_reaction(saved.id, owner, "👍").unwrap();
        lifecycle.toggle_reaction(saved.id, Uuid::new_v4(), "👍").unwrap();
        assert_eq!(lifecycle.store().get_reactions(saved.id).unwrap().len(), 2);

        lifecycle.delete(saved.id, owner).unwrap();

        assert!(lifecycle.store().get_message(saved.id).unwrap().is_none());
        assert!(lifecycle.store().get_reactions(saved.id).unwrap().is_empty());
    }

    #[test]
    fn reply_outlives_deleted_quote() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let quoted = lifecycle.insert(Message::new(general(), owner), owner).unwrap();

        let mut reply = Message::new(general(), owner);
        reply.is_reply = true;
        reply.linked_message = Some(quoted.id);
        let reply = lifecycle.insert(reply, owner).unwrap();

        lifecycle.delete(quoted.id, owner).unwrap();

        assert!(lifecycle.toggle_reaction(reply.id, owner, "👍").is_ok());
        let edited = lifecycle
            .update(reply.id, owner, |m| m.text = Some("still here".into()))
            .unwrap();
        assert!(edited.is_edited());
        assert!(lifecycle.store().get_message(reply.id).unwrap().unwrap().is_edited());
    }

    #[test]
    fn failed_publish_rolls_back() {
        let lifecycle = lifecycle(true);
        let owner = Uuid::new_v4();
        let message = Message::new(general(), owner);
        let id = message.id;

        let err = lifecycle.insert(message, owner).unwrap_err();

        assert!(matches!(err, HookError::Publish(_)));
        assert!(lifecycle.store().get_message(id).unwrap().is_none());
    }

    #[test]
    fn listing_pages_newest_first() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut m = Message::new(general(), owner);
            m.creation = Utc::now() + chrono::Duration::seconds(i);
            ids.push(lifecycle.insert(m, owner).unwrap());
        }

        let page = lifecycle.store().get_messages(general(), 2, None).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[2].id, ids[1].id]);

        let older = lifecycle
            .store()
            .get_messages(general(), 2, Some(PageCursor::from(&page[1])))
            .unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].id, ids[0].id);
    }

    #[test]
    fn paging_keeps_messages_sharing_a_timestamp() {
        let lifecycle = lifecycle(false);
        let owner = Uuid::new_v4();
        let creation = Utc::now();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut m = Message::new(general(), owner);
            m.creation = creation;
            ids.push(lifecycle.insert(m, owner).unwrap().id);
        }
        ids.sort();
        ids.reverse();

        let first = lifecycle.store().get_messages(general(), 1, None).unwrap();
        assert_eq!(first[0].id, ids[0]);

        let rest = lifecycle
            .store()
            .get_messages(general(), 10, Some(PageCursor::from(&first[0])))
            .unwrap();
        assert_eq!(rest.iter().map(|m| m.id).collect::<Vec<_>>(), ids[1..].to_vec());

        let by_time_only = PageCursor { creation, id: None };
        assert!(lifecycle
            .store()
            .get_messages(general(), 10, Some(by_time_only))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn indexes_are_created_once() {
        let lifecycle = lifecycle(false);
        lifecycle.on_schema_update().unwrap();
        lifecycle.on_schema_update().unwrap();

        let count: i64 = lifecycle
            .store()
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index'
                     AND name IN ('idx_messages_channel_id_creation', 'idx_messages_message_type_creation')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn bad_index_column_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ensure_index(&["creation; DROP TABLE messages"]).is_err());
    }
}
