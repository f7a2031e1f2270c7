//! Push notification delivery through an HTTP notification relay.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, anyhow};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use raven_messaging::ports::{NotificationPort, NotifyError};

const RELAY_SEND_PATH: &str = "/api/method/notification_relay.api.send_notification.user";
const RELAY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    /// Project name the relay files notifications under.
    pub project: String,
}

impl RelayConfig {
    /// `RAVEN_PUSH_RELAY_URL` and `RAVEN_PUSH_PROJECT`. `None` when no relay
    /// URL is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("RAVEN_PUSH_RELAY_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())?;
        let project = std::env::var("RAVEN_PUSH_PROJECT").unwrap_or_else(|_| "raven".into());

        Some(Self { base_url, project })
    }
}

#[derive(Serialize)]
struct RelayNotification<'a> {
    project_name: &'a str,
    user_id: Uuid,
    title: &'a str,
    body: &'a str,
}

/// [`NotificationPort`] backed by a notification relay. Without a relay
/// configured, push is reported as disabled.
///
/// Sends are blocking; callers run them on the blocking pool.
pub struct PushRelay {
    config: Option<RelayConfig>,
    client: OnceLock<Client>,
}

impl PushRelay {
    pub fn new(config: Option<RelayConfig>) -> Self {
        match &config {
            Some(c) => info!("Push relay configured at {} (project {})", c.base_url, c.project),
            None => info!("No push relay configured, mention notifications disabled"),
        }
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(RelayConfig::from_env())
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    fn send_url(config: &RelayConfig) -> String {
        format!("{}{}", config.base_url.trim_end_matches('/'), RELAY_SEND_PATH)
    }

    // Built on first use so the client is never created on an async thread.
    fn client(&self) -> anyhow::Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .context("Cannot create push relay client")?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl NotificationPort for PushRelay {
    fn is_enabled(&self) -> Result<bool, NotifyError> {
        Ok(self.config.is_some())
    }

    fn send_notification_to_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let Some(config) = &self.config else {
            return Err(NotifyError::Unsupported);
        };

        let response = self
            .client()?
            .post(Self::send_url(config))
            .json(&RelayNotification {
                project_name: &config.project,
                user_id,
                title,
                body,
            })
            .send()
            .context("Push relay request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(anyhow!("Push relay returned {}: {}", status, text).into());
        }

        debug!("Push notification sent to {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_relay_is_disabled() {
        let relay = PushRelay::disabled();

        assert!(!relay.is_enabled().unwrap());
        assert!(matches!(
            relay.send_notification_to_user(Uuid::new_v4(), "t", "b"),
            Err(NotifyError::Unsupported)
        ));
    }

    #[test]
    fn send_url_joins_base_and_path() {
        let config = RelayConfig {
            base_url: "https://push.example.com/".into(),
            project: "raven".into(),
        };

        assert_eq!(
            PushRelay::send_url(&config),
            "https://push.example.com/api/method/notification_relay.api.send_notification.user"
        );
        assert!(PushRelay::new(Some(config)).is_enabled().unwrap());
    }

    #[test]
    fn payload_shape() {
        let user_id = Uuid::new_v4();
        let payload = serde_json::to_value(RelayNotification {
            project_name: "raven",
            user_id,
            title: "You were mentioned",
            body: "hi",
        })
        .unwrap();

        assert_eq!(payload["project_name"], "raven");
        assert_eq!(payload["user_id"], user_id.to_string());
        assert_eq!(payload["body"], "hi");
    }
}
