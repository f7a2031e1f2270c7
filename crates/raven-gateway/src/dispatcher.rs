use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use raven_messaging::ports::{PublishError, RealtimePort};
use raven_types::events::GatewayEvent;

/// A serialized event on its way to the connections.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// `None` for global events.
    pub channel_id: Option<Uuid>,
    pub json: Arc<str>,
}

/// Fans gateway events out to every connected client. Each connection
/// drops channel-scoped events for channels it has not subscribed to.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Number of connections currently listening.
    pub fn connection_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }

    /// Serialize once and broadcast to all connections. Having no
    /// connections is not an error.
    pub fn broadcast(&self, event: &GatewayEvent) -> Result<(), PublishError> {
        let json = serde_json::to_string(event)
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let message = BroadcastMessage {
            channel_id: event.channel_id(),
            json: json.into(),
        };

        match self.inner.broadcast_tx.send(message) {
            Ok(receivers) => trace!("{} delivered to {} connections", event.name(), receivers),
            Err(_) => trace!("{} dropped, no connections", event.name()),
        }
        Ok(())
    }
}

impl RealtimePort for Dispatcher {
    fn publish(&self, event: GatewayEvent) -> Result<(), PublishError> {
        self.broadcast(&event)
    }
}
