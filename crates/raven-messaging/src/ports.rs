use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use raven_types::events::GatewayEvent;
use raven_types::models::{ChannelType, Message, ReplySource};

use crate::error::Result;

// -- Persistence --

/// Operations available inside one write transaction.
pub trait MessageTx {
    fn get_message(&self, id: Uuid) -> Result<Option<Message>>;

    /// Channel of a message, `None` if the message does not exist.
    fn message_channel(&self, id: Uuid) -> Result<Option<Uuid>>;

    fn reply_source(&self, id: Uuid) -> Result<Option<ReplySource>>;

    /// Insert a message together with its mention rows.
    fn insert_message(&mut self, message: &Message) -> Result<()>;

    /// Overwrite a stored message and replace its mention rows.
    fn update_message(&mut self, message: &Message) -> Result<()>;

    /// Delete a message and its mention rows.
    fn delete_message(&mut self, id: Uuid) -> Result<()>;

    /// Delete every reaction row of a message. Returns the number removed.
    fn delete_reactions(&mut self, message_id: Uuid) -> Result<usize>;

    /// Toggle a reaction row: removes it if present, inserts it if not.
    /// Returns `true` when the reaction was added.
    fn toggle_reaction(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool>;

    /// All (user, emoji) reaction rows of a message, oldest first.
    fn reactions(&self, message_id: Uuid) -> Result<Vec<(Uuid, String)>>;

    fn channel_type(&self, channel_id: Uuid) -> Result<Option<ChannelType>>;

    fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Record `at` as the user's last visit to the channel.
    fn track_visit(&mut self, channel_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Transactional message storage.
///
/// `transaction` commits when `f` returns `Ok` and rolls back otherwise.
pub trait MessageStore: Send + Sync {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MessageTx) -> Result<T>;

    /// Ensure a composite index over the given message columns exists.
    fn ensure_index(&self, columns: &[&str]) -> Result<()>;
}

impl<S: MessageStore + ?Sized> MessageStore for Arc<S> {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MessageTx) -> Result<T>,
    {
        (**self).transaction(f)
    }

    fn ensure_index(&self, columns: &[&str]) -> Result<()> {
        (**self).ensure_index(columns)
    }
}

// -- Realtime --

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Realtime transport is closed")]
    Closed,
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Realtime pub/sub transport. Channel-scoped events reach only that
/// channel's subscribers; the event carries its own scope
/// (see [`GatewayEvent::channel_id`]).
pub trait RealtimePort: Send + Sync {
    fn publish(&self, event: GatewayEvent) -> std::result::Result<(), PublishError>;
}

// -- Push notifications --

#[derive(Error, Debug)]
pub enum NotifyError {
    /// Push notifications are not available in this deployment.
    #[error("Push notifications are not supported")]
    Unsupported,
    #[error("Push delivery failed: {0}")]
    Other(#[from] anyhow::Error),
}

pub trait NotificationPort: Send + Sync {
    fn is_enabled(&self) -> std::result::Result<bool, NotifyError>;

    fn send_notification_to_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError>;
}

// -- Rich text --

/// Converts rich text (HTML) into a plain-text preview.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, html: &str) -> anyhow::Result<String>;
}
