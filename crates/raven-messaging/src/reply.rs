use raven_types::models::{DATETIME_FORMAT, Message, ReplySnapshot};

use crate::error::{HookError, Result};
use crate::ports::MessageTx;

pub const LINKED_MESSAGE_CHANNEL_MISMATCH: &str = "Linked message should be in the same channel";

/// A linked message must live in the same channel as the message linking to it.
pub fn validate_linked_message(tx: &dyn MessageTx, message: &Message) -> Result<()> {
    let Some(linked) = message.linked_message else {
        return Ok(());
    };

    if tx.message_channel(linked)? != Some(message.channel_id) {
        return Err(HookError::Validation(LINKED_MESSAGE_CHANNEL_MISMATCH.to_string()));
    }

    Ok(())
}

/// Copy the quoted message's fields onto a new reply. Runs once, before insert.
pub fn snapshot_reply(tx: &dyn MessageTx, message: &mut Message) -> Result<()> {
    if !message.is_reply {
        return Ok(());
    }
    let Some(linked) = message.linked_message else {
        return Ok(());
    };

    let source = tx.reply_source(linked)?.ok_or(HookError::NotFound(linked))?;

    message.replied_message_details = Some(ReplySnapshot {
        text: source.text,
        content: source.content,
        file: source.file,
        message_type: source.message_type,
        owner: source.owner,
        creation: source.creation.format(DATETIME_FORMAT).to_string(),
    });

    Ok(())
}
