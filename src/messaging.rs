use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::enrichment::normalize_whatsapp_number;
use crate::errors::AppError;
use crate::gateway_client::MessageGateway;
use crate::models::{Lead, MessageLog, MessageStatus};
use crate::store::LeadStore;

/// Placeholder replaced by the lead's first name.
pub const NAME_PLACEHOLDER: &str = "{nome}";

/// Fills the campaign template for one lead.
pub fn render_template(template: &str, lead: &Lead) -> String {
    let first_name = lead
        .full_name
        .split_whitespace()
        .next()
        .unwrap_or(lead.full_name.as_str());
    template.replace(NAME_PLACEHOLDER, first_name)
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub log_id: Uuid,
    pub phone: String,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
}

/// Sends messages to leads through the gateway and keeps the message log.
#[derive(Clone)]
pub struct MessagingService {
    gateway: Arc<dyn MessageGateway>,
    store: Arc<dyn LeadStore>,
}

impl MessagingService {
    pub fn new(gateway: Arc<dyn MessageGateway>, store: Arc<dyn LeadStore>) -> Self {
        Self { gateway, store }
    }

    /// Sends `body` to the lead's phone.
    ///
    /// A lead without a valid phone is `InvalidInput` and nothing is logged.
    /// Gateway failures are logged as `falha` and returned as `UpstreamUnavailable`.
    pub async fn send_to_lead(&self, lead: &Lead, body: &str) -> Result<SendOutcome, AppError> {
        if body.trim().is_empty() {
            return Err(AppError::InvalidInput("Message body is empty".to_string()));
        }
        let raw_phone = lead
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("Lead {} has no phone", lead.id)))?;
        let phone = normalize_whatsapp_number(raw_phone)?;

        let sent = self.gateway.send_text(&phone, body).await;

        let mut log = MessageLog {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            phone: phone.clone(),
            body: body.to_string(),
            status: MessageStatus::Enviado,
            provider_message_id: None,
            error: None,
            sent_at: Utc::now(),
        };

        match sent {
            Ok(ack) => {
                log.provider_message_id = ack.message_id;
                self.store.log_message(&log).await?;
                tracing::info!("✓ Message sent to lead {} ({})", lead.id, phone);
                Ok(SendOutcome {
                    log_id: log.id,
                    phone,
                    status: log.status,
                    provider_message_id: log.provider_message_id,
                })
            }
            Err(e) => {
                log.status = MessageStatus::Falha;
                log.error = Some(e.to_string());
                self.store.log_message(&log).await?;
                tracing::warn!("Message to lead {} failed: {}", lead.id, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway_client::DeliveryAck;
    use crate::memory_store::MemoryLeadStore;
    use crate::models::{NewLead, SourceKind};
    use async_trait::async_trait;

    struct FailingGateway;

    #[async_trait]
    impl MessageGateway for FailingGateway {
        async fn send_text(&self, _phone: &str, _body: &str) -> Result<DeliveryAck, AppError> {
            Err(AppError::UpstreamUnavailable("gateway down".to_string()))
        }
    }

    fn lead(phone: Option<&str>) -> Lead {
        NewLead {
            campaign_id: Uuid::new_v4(),
            full_name: "Carla Menezes".to_string(),
            region: "SP".to_string(),
            phone: phone.map(String::from),
            ..Default::default()
        }
        .into_lead(SourceKind::Mock)
    }

    #[test]
    fn template_uses_first_name() {
        assert_eq!(
            render_template("Olá {nome}, tudo bem?", &lead(None)),
            "Olá Carla, tudo bem?"
        );
    }

    #[tokio::test]
    async fn gateway_failures_are_logged() {
        let store = Arc::new(MemoryLeadStore::new());
        let service = MessagingService::new(Arc::new(FailingGateway), store.clone());

        let err = service
            .send_to_lead(&lead(Some("11987654321")), "Olá")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        let logs = store.message_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, MessageStatus::Falha);
        assert_eq!(logs[0].phone, "5511987654321");
    }

    #[tokio::test]
    async fn lead_without_phone_is_rejected() {
        let store = Arc::new(MemoryLeadStore::new());
        let service = MessagingService::new(Arc::new(FailingGateway), store.clone());

        let err = service.send_to_lead(&lead(None), "Olá").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(store.message_logs().is_empty());
    }
}
