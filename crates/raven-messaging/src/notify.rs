use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::ports::{NotificationPort, NotifyError};

pub const MENTION_TITLE: &str = "You were mentioned";

/// Best-effort push notifications for mentions. Never fails the caller.
#[derive(Clone)]
pub struct MentionNotifier {
    port: Arc<dyn NotificationPort>,
}

impl MentionNotifier {
    pub fn new(port: Arc<dyn NotificationPort>) -> Self {
        Self { port }
    }

    pub fn notify(&self, user_id: Uuid, preview: Option<&str>) {
        match self.try_notify(user_id, preview.unwrap_or("")) {
            Ok(()) => {}
            Err(NotifyError::Unsupported) => {
                debug!("Push notifications unsupported, not notifying {}", user_id);
            }
            Err(e) => error!("Mention notification to {} failed: {}", user_id, e),
        }
    }

    fn try_notify(&self, user_id: Uuid, body: &str) -> Result<(), NotifyError> {
        if !self.port.is_enabled()? {
            return Ok(());
        }
        self.port.send_notification_to_user(user_id, MENTION_TITLE, body)
    }
}
