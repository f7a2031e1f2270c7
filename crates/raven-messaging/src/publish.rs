use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use raven_types::events::{CreatedMessageDetails, EditedMessageDetails, GatewayEvent};
use raven_types::models::Message;

use crate::ports::{PublishError, RealtimePort};

pub fn created_event(message: &Message, sender: Uuid) -> GatewayEvent {
    GatewayEvent::MessageCreated {
        channel_id: message.channel_id,
        sender,
        message_id: message.id,
        message_details: Box::new(CreatedMessageDetails {
            text: message.text.clone(),
            content: message.content.clone(),
            file: message.file.clone(),
            message_type: message.message_type,
            is_edited: message.is_edited() as u8,
            is_reply: message.is_reply,
            creation: message.creation,
            owner: message.owner,
            modified_by: message.modified_by,
            modified: message.modified,
            linked_message: message.linked_message,
            replied_message_details: message.replied_message_details.clone(),
            link_doctype: message.link_doctype.clone(),
            link_document: message.link_document.clone(),
            message_reactions: message.message_reactions.clone(),
            thumbnail_width: message.thumbnail_width,
            thumbnail_height: message.thumbnail_height,
            file_thumbnail: message.file_thumbnail.clone(),
            image_width: message.image_width,
            image_height: message.image_height,
            name: message.id,
        }),
    }
}

pub fn edited_event(message: &Message, sender: Uuid) -> GatewayEvent {
    GatewayEvent::MessageEdited {
        channel_id: message.channel_id,
        sender,
        message_id: message.id,
        message_details: Box::new(EditedMessageDetails {
            text: message.text.clone(),
            content: message.content.clone(),
            file: message.file.clone(),
            message_type: message.message_type,
            is_edited: 1,
            is_reply: message.is_reply,
            modified: message.modified,
            linked_message: message.linked_message,
            replied_message_details: message.replied_message_details.clone(),
            link_doctype: message.link_doctype.clone(),
            link_document: message.link_document.clone(),
            message_reactions: message.message_reactions.clone(),
        }),
    }
}

pub fn deleted_event(message: &Message, sender: Uuid) -> GatewayEvent {
    GatewayEvent::MessageDeleted {
        channel_id: message.channel_id,
        sender,
        message_id: message.id,
    }
}

pub fn unread_count_event(message: &Message) -> GatewayEvent {
    GatewayEvent::UnreadChannelCountUpdated {
        channel_id: message.channel_id,
        play_sound: true,
        sent_by: message.owner,
    }
}

/// Emits lifecycle events through the realtime port. Publish errors are
/// returned so the enclosing write fails.
#[derive(Clone)]
pub struct EventPublisher {
    realtime: Arc<dyn RealtimePort>,
}

impl EventPublisher {
    pub fn new(realtime: Arc<dyn RealtimePort>) -> Self {
        Self { realtime }
    }

    /// Global unread-count bump, sent right after insert.
    pub fn inserted(&self, message: &Message) -> Result<(), PublishError> {
        self.emit(unread_count_event(message))
    }

    /// `message_edited` for edited messages, `message_created` otherwise.
    pub fn saved(&self, message: &Message, sender: Uuid) -> Result<(), PublishError> {
        let event = if message.is_edited() {
            edited_event(message, sender)
        } else {
            created_event(message, sender)
        };
        self.emit(event)
    }

    pub fn deleted(&self, message: &Message, sender: Uuid) -> Result<(), PublishError> {
        self.emit(deleted_event(message, sender))
    }

    fn emit(&self, event: GatewayEvent) -> Result<(), PublishError> {
        debug!("Publishing {} (channel {:?})", event.name(), event.channel_id());
        self.realtime.publish(event)
    }
}
