//! Notification sink boundary.
//!
//! The engine only knows three destinations: a single actor, every holder
//! of a role capability, and the report channel. How a message reaches a
//! person is the sink's business.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::EngineError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_direct(&self, actor_id: &str, text: &str) -> Result<(), EngineError>;
    async fn send_to_role_group(&self, role: &str, text: &str) -> Result<(), EngineError>;
    async fn post_report(&self, text: &str) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Delivery<'a> {
    Direct { target: &'a str, content: &'a str },
    RoleGroup { target: &'a str, content: &'a str },
    Report { content: &'a str },
}

/// POSTs every message as JSON to one webhook; the receiving bridge fans
/// it out to the chat platform.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, delivery: Delivery<'_>) -> Result<(), EngineError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&delivery)
            .send()
            .await
            .map_err(|e| EngineError::Notify(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Notify(format!(
                "{} returned status {}",
                self.url,
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_direct(&self, actor_id: &str, text: &str) -> Result<(), EngineError> {
        self.post(Delivery::Direct {
            target: actor_id,
            content: text,
        })
        .await
    }

    async fn send_to_role_group(&self, role: &str, text: &str) -> Result<(), EngineError> {
        self.post(Delivery::RoleGroup {
            target: role,
            content: text,
        })
        .await
    }

    async fn post_report(&self, text: &str) -> Result<(), EngineError> {
        self.post(Delivery::Report { content: text }).await
    }
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Writes every message to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_direct(&self, actor_id: &str, text: &str) -> Result<(), EngineError> {
        tracing::info!(actor_id, "{text}");
        Ok(())
    }

    async fn send_to_role_group(&self, role: &str, text: &str) -> Result<(), EngineError> {
        tracing::info!(role, "{text}");
        Ok(())
    }

    async fn post_report(&self, text: &str) -> Result<(), EngineError> {
        tracing::info!("{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn webhook_posts_tagged_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "kind": "role_group",
                "target": "officer",
                "content": "heads up"
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.url()));
        notifier
            .send_to_role_group("officer", "heads up")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_failure_is_a_notify_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.url()));
        let err = notifier.send_direct("42", "hi").await.unwrap_err();
        assert!(matches!(err, EngineError::Notify(msg) if msg.contains("500")));
    }
}
