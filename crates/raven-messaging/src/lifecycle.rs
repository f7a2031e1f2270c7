use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use raven_types::models::{Mention, Message};

use crate::edit::track_edit;
use crate::error::{HookError, Result};
use crate::mentions::for_each_new_mention;
use crate::normalize::HtmlNormalizer;
use crate::notify::MentionNotifier;
use crate::ports::{MessageStore, MessageTx, NotificationPort, RealtimePort, TextNormalizer};
use crate::publish::EventPublisher;
use crate::reactions;
use crate::reply::{snapshot_reply, validate_linked_message};
use crate::visit::track_visit;

/// Composite indexes kept on the messages table.
pub const MESSAGE_INDEXES: [&[&str]; 2] = [&["channel_id", "creation"], &["message_type", "creation"]];

/// Runs the message hooks around every write.
///
/// Each write path runs inside one storage transaction; an error from any
/// hook (including a realtime publish) rolls the whole write back.
pub struct MessageLifecycle<S> {
    store: S,
    publisher: EventPublisher,
    notifier: MentionNotifier,
    normalizer: Arc<dyn TextNormalizer>,
}

impl<S: MessageStore> MessageLifecycle<S> {
    pub fn new(
        store: S,
        realtime: Arc<dyn RealtimePort>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            store,
            publisher: EventPublisher::new(realtime),
            notifier: MentionNotifier::new(notifications),
            normalizer: Arc::new(HtmlNormalizer),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Schema maintenance: make sure the message query indexes exist.
    pub fn on_schema_update(&self) -> Result<()> {
        for columns in MESSAGE_INDEXES {
            self.store.ensure_index(columns)?;
        }
        info!("Message indexes ensured");
        Ok(())
    }

    /// Insert a new message sent by `actor`.
    pub fn insert(&self, mut message: Message, actor: Uuid) -> Result<Message> {
        let (message, mentioned) = self.store.transaction(|tx| {
            let mentioned = self.before_validate(&mut message, None);
            validate_linked_message(tx, &message)?;
            snapshot_reply(tx, &mut message)?;
            self.before_save(tx, &message, actor)?;

            tx.insert_message(&message)?;

            self.publisher.inserted(&message)?;
            self.publisher.saved(&message, actor)?;

            info!("Message {} created in channel {}", message.id, message.channel_id);
            Ok((message, mentioned))
        })?;

        self.notify_mentioned(&message, &mentioned);
        Ok(message)
    }

    /// Load a stored message, apply `change` to it and save it back.
    pub fn update<F>(&self, id: Uuid, actor: Uuid, change: F) -> Result<Message>
    where
        F: FnOnce(&mut Message),
    {
        let (message, mentioned) = self.store.transaction(|tx| self.update_in(tx, id, actor, change))?;

        self.notify_mentioned(&message, &mentioned);
        Ok(message)
    }

    /// Add or remove `user_id`'s `emoji` reaction and save the refreshed
    /// aggregate. Returns whether the reaction was added.
    pub fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<(bool, Message)> {
        let (added, message, mentioned) = self.store.transaction(|tx| {
            if tx.message_channel(message_id)?.is_none() {
                return Err(HookError::NotFound(message_id));
            }

            let added = tx.toggle_reaction(message_id, user_id, emoji)?;
            let aggregate = reactions::aggregate(&tx.reactions(message_id)?);

            let (message, mentioned) = self.update_in(tx, message_id, user_id, |m| {
                m.message_reactions = aggregate;
            })?;

            Ok((added, message, mentioned))
        })?;

        self.notify_mentioned(&message, &mentioned);
        Ok((added, message))
    }

    /// Delete a message and its reactions.
    pub fn delete(&self, id: Uuid, actor: Uuid) -> Result<Message> {
        self.store.transaction(|tx| {
            let message = tx.get_message(id)?.ok_or(HookError::NotFound(id))?;

            let removed = tx.delete_reactions(id)?;
            debug!("Removed {} reactions of message {}", removed, id);

            tx.delete_message(id)?;

            self.publisher.deleted(&message, actor)?;

            info!("Message {} deleted from channel {}", id, message.channel_id);
            Ok(message)
        })
    }

    /// Returns the saved message and the users it mentions for the first time.
    fn update_in<F>(
        &self,
        tx: &mut dyn MessageTx,
        id: Uuid,
        actor: Uuid,
        change: F,
    ) -> Result<(Message, Vec<Uuid>)>
    where
        F: FnOnce(&mut Message),
    {
        let previous = tx.get_message(id)?.ok_or(HookError::NotFound(id))?;
        let mut message = previous.clone();
        change(&mut message);
        message.modified = Utc::now();
        message.modified_by = actor;

        let mentioned = self.before_validate(&mut message, Some(&previous));
        // The link was checked when it was set; its target may be gone since.
        if message.linked_message != previous.linked_message {
            validate_linked_message(tx, &message)?;
        }
        self.before_save(tx, &message, actor)?;

        tx.update_message(&message)?;

        self.publisher.saved(&message, actor)?;

        Ok((message, mentioned))
    }

    /// Preview rendering, edit tracking and mention processing. Returns the
    /// newly mentioned users.
    fn before_validate(&self, message: &mut Message, previous: Option<&Message>) -> Vec<Uuid> {
        if let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) {
            match self.normalizer.normalize(text) {
                Ok(content) => message.content = Some(content.trim_end().to_string()),
                Err(e) => debug!("Could not render preview for {}: {}", message.id, e),
            }
        }

        if let Some(previous) = previous {
            track_edit(previous, message);
        }

        process_mentions(message)
    }

    /// Push notifications go out only once the write is committed, with the
    /// storage lock released.
    fn notify_mentioned(&self, message: &Message, users: &[Uuid]) {
        for user in users {
            self.notifier.notify(*user, message.content.as_deref());
        }
    }

    fn before_save(&self, tx: &mut dyn MessageTx, message: &Message, actor: Uuid) -> Result<()> {
        track_visit(tx, message.channel_id, actor, Utc::now())
    }
}

/// Append every user mentioned for the first time and return them in
/// document order.
fn process_mentions(message: &mut Message) -> Vec<Uuid> {
    let Some(doc) = message.json.as_ref() else {
        return Vec::new();
    };

    let mut seen: HashSet<Uuid> = message.mentions.iter().map(|m| m.user).collect();
    let mut added = Vec::new();
    for_each_new_mention(doc, &mut seen, |user| added.push(user));

    message.mentions.extend(added.iter().map(|&user| Mention { user }));
    added
}
