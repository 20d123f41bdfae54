//! # Notification Dispatch Client
//!
//! ## Purpose
//! Fire-and-forget notification transport for triggered alerts. One
//! notification is dispatched per configured channel; a channel failure is
//! logged by the caller and never blocks sibling channels.
//!
//! ## Input/Output Specification
//! - **Input**: Channel name, recipient identifier, alert payload
//! - **Output**: Delivery acknowledgement or a typed error
//! - **Channels**: email, in_app, push — routed by the transport service

use crate::errors::{IntelError, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Payload of a triggered-alert notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    /// Subject line, includes severity and alert label
    pub subject: String,
    /// Message body
    pub body: String,
    /// Alert severity (critical/high/medium/low)
    pub severity: String,
    /// External reference of the triggering resolution
    pub external_ref: String,
}

/// Contract for the notification transport
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one notification over `channel` to `recipient`
    async fn send(
        &self,
        channel: &str,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct DispatchRequest<'a> {
    channel: &'a str,
    recipient: &'a str,
    #[serde(flatten)]
    payload: &'a NotificationPayload,
}

/// HTTP webhook dispatcher posting to the configured transport endpoint
pub struct WebhookDispatcher {
    client: reqwest::Client,
    config: crate::config::AlertsConfig,
}

impl WebhookDispatcher {
    pub fn new(config: crate::config::AlertsConfig) -> Result<Self> {
        let client = super::http_client(config.dispatch_timeout_seconds, super::USER_AGENT)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn send(
        &self,
        channel: &str,
        recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<()> {
        let response = self
            .client
            .post(&self.config.dispatch_url)
            .json(&DispatchRequest {
                channel,
                recipient,
                payload,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "notifications".to_string(),
                details: format!(
                    "dispatch over '{}' returned HTTP {}",
                    channel,
                    response.status()
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertsConfig;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_dispatch_posts_channel_and_payload() {
        let server = MockServer::start().await;

        let expected = serde_json::json!({
            "channel": "email",
            "recipient": "42",
            "subject": "[CRITICAL] Doctrina anulada — STS 123/2024",
            "body": "La resolución ha cambiado de estado.",
            "severity": "critical",
            "external_ref": "STS 123/2024",
        });

        Mock::given(method("POST"))
            .and(path("/dispatch"))
            .and(body_json_string(expected.to_string()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::new(AlertsConfig {
            max_alerts_per_owner: 0,
            dispatch_url: format!("{}/dispatch", server.uri()),
            dispatch_timeout_seconds: 5,
        })
        .unwrap();

        dispatcher
            .send(
                "email",
                "42",
                &NotificationPayload {
                    subject: "[CRITICAL] Doctrina anulada — STS 123/2024".to_string(),
                    body: "La resolución ha cambiado de estado.".to_string(),
                    severity: "critical".to_string(),
                    external_ref: "STS 123/2024".to_string(),
                },
            )
            .await
            .unwrap();
    }
}
