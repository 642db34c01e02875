use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Payment providers that notify us through webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    MercadoPago,
    Stripe,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::MercadoPago => "mercadopago",
            PaymentProvider::Stripe => "stripe",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mercadopago" | "mercado_pago" | "mercado-pago" => Ok(PaymentProvider::MercadoPago),
            "stripe" => Ok(PaymentProvider::Stripe),
            other => Err(AppError::InvalidInput(format!(
                "Unknown payment provider '{}'",
                other
            ))),
        }
    }
}

/// Payment webhook body - can be single object or array
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PaymentWebhookPayload {
    Single(PaymentWebhookEvent),
    Batch(Vec<PaymentWebhookEvent>),
}

impl PaymentWebhookPayload {
    /// Convert to a vec of events for uniform processing
    pub fn into_events(self) -> Vec<PaymentWebhookEvent> {
        match self {
            PaymentWebhookPayload::Single(event) => vec![event],
            PaymentWebhookPayload::Batch(events) => events,
        }
    }
}

/// Notification from Mercado Pago or Stripe.
///
/// Both providers send `id`, `type` and `data`; Mercado Pago may omit `id` and
/// only reference the payment through `data.id`. Mercado Pago ids are numeric.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentWebhookEvent {
    #[serde(default)]
    pub id: Option<Value>,

    /// e.g. "payment" (Mercado Pago) or "payment_intent.succeeded" (Stripe)
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,

    /// Mercado Pago action, e.g. "payment.updated"
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub data: Option<Value>,

    /// Raw data for any additional fields
    #[serde(flatten)]
    pub raw: Value,
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl PaymentWebhookEvent {
    /// Key under which the event is deduplicated, unique per provider.
    pub fn event_key(&self) -> Option<String> {
        if let Some(id) = self.id.as_ref().and_then(id_string) {
            return Some(id);
        }

        let data_id = self.data.as_ref().and_then(|d| d.get("id")).and_then(id_string)?;
        let kind = self
            .action
            .as_deref()
            .or(self.event_type.as_deref())
            .unwrap_or("event");
        Some(format!("{}:{}", kind, data_id))
    }

    pub fn kind(&self) -> Option<&str> {
        self.event_type.as_deref().or(self.action.as_deref())
    }
}

/// Response sent back to the provider
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub received: usize,
    pub processed: usize,
    pub duplicates: usize,
}
