//! Notification edge function client
//!
//! Email and SMS delivery is handled by an external function; this client
//! posts one JSON request per recipient.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};

/// A single outbound notification
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub studio_id: Uuid,
    pub family_id: Uuid,
    /// "email", "sms" or "both"
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subject: String,
    pub body: String,
    /// Source of the notification, e.g. "scheduled_message" or "invoice"
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct NotifyResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Anything that can deliver a notification
#[axum::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> AppResult<()>;
}

/// HTTP client for the notification edge function
#[derive(Clone)]
pub struct NotificationClient {
    client: Client,
    endpoint_url: String,
    api_key: String,
}

impl NotificationClient {
    pub fn new(config: &NotificationConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Notification client: {}", e)))?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[axum::async_trait]
impl Notifier for NotificationClient {
    async fn send(&self, notification: &Notification) -> AppResult<()> {
        let mut request = self.client.post(&self.endpoint_url).json(notification);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::NotificationService(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response
            .json::<NotifyResponse>()
            .await
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| status.to_string());

        Err(AppError::NotificationService(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_payload_omits_missing_contacts() {
        let n = Notification {
            studio_id: Uuid::nil(),
            family_id: Uuid::nil(),
            channel: "email".into(),
            email: Some("parent@example.com".into()),
            phone: None,
            subject: "Recital".into(),
            body: "Dress rehearsal moved to Friday".into(),
            kind: "scheduled_message".into(),
            reference_id: None,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["email"], "parent@example.com");
        assert!(json.get("phone").is_none());
        assert!(json.get("reference_id").is_none());
    }
}
