use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use raven_types::models::ChannelType;

use crate::error::Result;
use crate::ports::MessageTx;

/// Record that `user_id` just looked at the channel. Private channels only
/// track their members.
pub fn track_visit(
    tx: &mut dyn MessageTx,
    channel_id: Uuid,
    user_id: Uuid,
    at: DateTime<Utc>,
) -> Result<()> {
    let Some(channel_type) = tx.channel_type(channel_id)? else {
        debug!("Channel {} not found, visit not tracked", channel_id);
        return Ok(());
    };

    if channel_type != ChannelType::Private || tx.is_channel_member(channel_id, user_id)? {
        tx.track_visit(channel_id, user_id, at)?;
    }

    Ok(())
}
