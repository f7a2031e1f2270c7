use thiserror::Error;
use uuid::Uuid;

use crate::ports::PublishError;

#[derive(Error, Debug)]
pub enum HookError {
    /// User-facing validation failure. Aborts the whole write.
    #[error("{0}")]
    Validation(String),
    #[error("Message not found: {0}")]
    NotFound(Uuid),
    #[error("Realtime publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HookError>;
