use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::circuit_breaker::{create_upstream_circuit_breaker, guarded, UpstreamBreaker};
use crate::config::Config;
use crate::errors::AppError;

/// Acknowledgement returned by the messaging gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAck {
    /// Provider-side message id, when the gateway returns one.
    pub message_id: Option<String>,
    pub status: Option<String>,
}

/// Anything that can deliver a text message to a phone number.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// `phone` is already normalized: digits only, country code first.
    async fn send_text(&self, phone: &str, body: &str) -> Result<DeliveryAck, AppError>;
}

/// Client for the WhatsApp automation gateway.
///
/// The gateway owns session and connection management; this client only posts messages.
#[derive(Clone)]
pub struct WhatsAppGatewayClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    breaker: UpstreamBreaker,
}

impl WhatsAppGatewayClient {
    /// Creates a new `WhatsAppGatewayClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the gateway.
    /// * `token` - The API token for authentication.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create WhatsApp gateway client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            breaker: create_upstream_circuit_breaker(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let creds = config.require_whatsapp_gateway()?;
        Self::new(creds.base_url.clone(), creds.token.clone())
    }
}

#[async_trait]
impl MessageGateway for WhatsAppGatewayClient {
    /// Sends a text message.
    ///
    /// # Returns
    ///
    /// * `Result<DeliveryAck, AppError>` - The gateway acknowledgement.
    async fn send_text(&self, phone: &str, body: &str) -> Result<DeliveryAck, AppError> {
        let url = format!("{}/messages", self.base_url);
        tracing::info!("Sending WhatsApp message to {}", phone);

        let payload = json!({
            "phone": phone,
            "body": body
        });

        let response = guarded(&self.breaker, "WhatsApp gateway", async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    AppError::UpstreamUnavailable(format!("Failed to send message: {}", e))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::UpstreamUnavailable(format!(
                    "WhatsApp gateway send failed {}: {}",
                    status, error_text
                )));
            }
            Ok(response)
        })
        .await?;

        // Some gateway builds answer 200 with an empty body
        let data: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        let message_id = data
            .get("id")
            .or_else(|| data.get("message_id"))
            .or_else(|| data.get("key").and_then(|k| k.get("id")))
            .and_then(|id| match id {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        let status = data
            .get("status")
            .and_then(|s| s.as_str())
            .map(String::from);

        tracing::info!("✓ Message accepted by gateway for {} (id: {:?})", phone, message_id);
        Ok(DeliveryAck { message_id, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = WhatsAppGatewayClient::new("https://gateway.example.com/", "token");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "https://gateway.example.com");
    }
}
