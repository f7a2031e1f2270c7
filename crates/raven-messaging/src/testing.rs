//! In-memory port doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use raven_types::events::GatewayEvent;
use raven_types::models::{ChannelType, Message, ReplySource};

use crate::error::Result;
use crate::ports::{
    MessageStore, MessageTx, NotificationPort, NotifyError, PublishError, RealtimePort,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub messages: HashMap<Uuid, Message>,
    /// (message, user, emoji)
    pub reactions: Vec<(Uuid, Uuid, String)>,
    pub channels: HashMap<Uuid, ChannelType>,
    /// (channel, user) -> last visit
    pub members: HashMap<(Uuid, Uuid), Option<DateTime<Utc>>>,
    pub indexes: Vec<Vec<String>>,
}

/// Transactions work on a copy of the state that replaces the original on commit.
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn seed_message(&self, message: Message) {
        self.state.lock().unwrap().messages.insert(message.id, message);
    }

    pub fn seed_channel(&self, channel_id: Uuid, channel_type: ChannelType) {
        self.state.lock().unwrap().channels.insert(channel_id, channel_type);
    }

    pub fn seed_member(&self, channel_id: Uuid, user_id: Uuid) {
        self.state.lock().unwrap().members.insert((channel_id, user_id), None);
    }

    pub fn seed_reaction(&self, message_id: Uuid, user_id: Uuid, emoji: &str) {
        self.state
            .lock()
            .unwrap()
            .reactions
            .push((message_id, user_id, emoji.to_string()));
    }

    pub fn message(&self, id: Uuid) -> Option<Message> {
        self.state.lock().unwrap().messages.get(&id).cloned()
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }
}

impl MessageStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn MessageTx) -> Result<T>,
    {
        let mut guard = self.state.lock().unwrap();
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }

    fn ensure_index(&self, columns: &[&str]) -> Result<()> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let mut state = self.state.lock().unwrap();
        if !state.indexes.contains(&columns) {
            state.indexes.push(columns);
        }
        Ok(())
    }
}

impl MessageTx for MemoryState {
    fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.messages.get(&id).cloned())
    }

    fn message_channel(&self, id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.messages.get(&id).map(|m| m.channel_id))
    }

    fn reply_source(&self, id: Uuid) -> Result<Option<ReplySource>> {
        Ok(self.messages.get(&id).map(ReplySource::from))
    }

    fn insert_message(&mut self, message: &Message) -> Result<()> {
        if self.messages.contains_key(&message.id) {
            return Err(anyhow!("duplicate message id {}", message.id).into());
        }
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    fn update_message(&mut self, message: &Message) -> Result<()> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    fn delete_message(&mut self, id: Uuid) -> Result<()> {
        self.messages.remove(&id);
        Ok(())
    }

    fn delete_reactions(&mut self, message_id: Uuid) -> Result<usize> {
        let before = self.reactions.len();
        self.reactions.retain(|(m, _, _)| *m != message_id);
        Ok(before - self.reactions.len())
    }

    fn toggle_reaction(&mut self, message_id: Uuid, user_id: Uuid, emoji: &str) -> Result<bool> {
        let existing = self
            .reactions
            .iter()
            .position(|(m, u, e)| *m == message_id && *u == user_id && e == emoji);
        match existing {
            Some(idx) => {
                self.reactions.remove(idx);
                Ok(false)
            }
            None => {
                self.reactions.push((message_id, user_id, emoji.to_string()));
                Ok(true)
            }
        }
    }

    fn reactions(&self, message_id: Uuid) -> Result<Vec<(Uuid, String)>> {
        Ok(self
            .reactions
            .iter()
            .filter(|(m, _, _)| *m == message_id)
            .map(|(_, u, e)| (*u, e.clone()))
            .collect())
    }

    fn channel_type(&self, channel_id: Uuid) -> Result<Option<ChannelType>> {
        Ok(self.channels.get(&channel_id).copied())
    }

    fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.members.contains_key(&(channel_id, user_id)))
    }

    fn track_visit(&mut self, channel_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.members.insert((channel_id, user_id), Some(at));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRealtime {
    pub events: Mutex<Vec<GatewayEvent>>,
    pub fail: AtomicBool,
}

impl RecordingRealtime {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<GatewayEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(GatewayEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl RealtimePort for RecordingRealtime {
    fn publish(&self, event: GatewayEvent) -> std::result::Result<(), PublishError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(PublishError::Transport("socket closed".into()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushMode {
    #[default]
    Enabled,
    Disabled,
    Unsupported,
    Failing,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub mode: PushMode,
    /// (user, title, body)
    pub sent: Mutex<Vec<(Uuid, String, String)>>,
}

impl RecordingNotifier {
    pub fn with_mode(mode: PushMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(Uuid, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn is_enabled(&self) -> std::result::Result<bool, NotifyError> {
        match self.mode {
            PushMode::Unsupported => Err(NotifyError::Unsupported),
            PushMode::Disabled => Ok(false),
            PushMode::Enabled | PushMode::Failing => Ok(true),
        }
    }

    fn send_notification_to_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError> {
        if self.mode == PushMode::Failing {
            return Err(anyhow!("relay returned 502").into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, title.to_string(), body.to_string()));
        Ok(())
    }
}
