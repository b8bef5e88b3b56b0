//! Payment provider REST client
//!
//! Form-encoded requests authenticated with the secret API key, in the
//! shape used by Stripe-compatible providers.

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::error::{AppError, AppResult};

/// Payment provider API client
#[derive(Clone)]
pub struct PaymentProviderClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

/// Subscription as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Customer as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

impl PaymentProviderClient {
    /// Create a new client from billing configuration
    pub fn new(config: &BillingConfig) -> Self {
        Self::with_base_url(config.secret_key.clone(), config.api_base_url.clone())
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Whether a secret key has been configured
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    /// Create a customer for a family
    pub async fn create_customer(
        &self,
        family_id: Uuid,
        name: &str,
        email: Option<&str>,
    ) -> AppResult<ProviderCustomer> {
        let family_id = family_id.to_string();
        let mut form = vec![
            ("name", name),
            ("metadata[family_id]", family_id.as_str()),
        ];
        if let Some(email) = email {
            form.push(("email", email));
        }

        let response = self
            .authorized(self.client.post(format!("{}/customers", self.base_url)))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Request failed: {}", e)))?;

        Self::parse(response).await
    }

    /// Fetch a subscription by id
    pub async fn retrieve_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/subscriptions/{}", self.base_url, subscription_id)),
            )
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Request failed: {}", e)))?;

        Self::parse(response).await
    }

    /// Cancel a subscription immediately
    pub async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<ProviderSubscription> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/subscriptions/{}", self.base_url, subscription_id)),
            )
            .send()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Request failed: {}", e)))?;

        Self::parse(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.secret_key)
    }

    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ProviderErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(AppError::PaymentProvider(message));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentProvider(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = PaymentProviderClient::with_base_url("sk_test".into(), "https://pay.test/v1/".into());
        assert_eq!(client.base_url, "https://pay.test/v1");
        assert!(client.is_configured());
    }

    #[test]
    fn test_unconfigured_client() {
        let client = PaymentProviderClient::with_base_url(String::new(), "https://pay.test".into());
        assert!(!client.is_configured());
    }

    #[test]
    fn test_subscription_defaults() {
        let sub: ProviderSubscription =
            serde_json::from_str(r#"{"id":"sub_1","customer":"cus_1","status":"active"}"#).unwrap();
        assert!(!sub.cancel_at_period_end);
        assert!(sub.current_period_end.is_none());
        assert!(sub.metadata.is_empty());
    }
}
