//! Raven message lifecycle.
//!
//! Hooks that run around every write of a chat message:
//! - plain-text preview rendering from the rich-text body
//! - edit tracking and reply validation/snapshotting
//! - `@mention` extraction with best-effort push notifications
//! - realtime fan-out of created/edited/deleted events
//!
//! Storage, realtime transport and push delivery are reached only through
//! the traits in [`ports`].

pub mod edit;
pub mod error;
pub mod lifecycle;
pub mod mentions;
pub mod normalize;
pub mod notify;
pub mod ports;
pub mod publish;
pub mod reactions;
pub mod reply;
pub mod rich_text;
pub mod visit;

#[cfg(test)]
mod testing;

pub use error::HookError;
pub use lifecycle::MessageLifecycle;
pub use mentions::extract_mentions;
pub use normalize::HtmlNormalizer;
pub use ports::{
    MessageStore, MessageTx, NotificationPort, NotifyError, PublishError, RealtimePort,
    TextNormalizer,
};
