use crate::errors::AppError;
use crate::handlers::AppState;
use crate::store::{LeadStore, PaymentEventRecord};
use crate::webhook_models::{
    PaymentProvider, PaymentWebhookEvent, PaymentWebhookPayload, WebhookResponse,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

/// Payment Webhook Handler
///
/// Receives payment notifications from Mercado Pago or Stripe.
/// Validates the webhook secret and records each event exactly once.
///
/// Expected payload: Single event object OR array of events
/// Authentication: X-Webhook-Token header must match PAYMENT_WEBHOOK_SECRET env var
///
/// The token is checked before the provider or the body is looked at, so an
/// unauthenticated caller always gets 401.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(state.config.payment_webhook_secret.as_deref(), &headers)?;

    let provider: PaymentProvider = provider.parse()?;
    tracing::info!("Received {} payment webhook", provider);

    let payload: PaymentWebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        AppError::InvalidInput(format!("Malformed {} webhook payload: {}", provider, e))
    })?;

    // 2. Record each event once (handles both single and batch)
    let response =
        process_payment_events(state.store.as_ref(), provider, payload.into_events()).await;

    Ok((StatusCode::OK, Json(response)))
}

/// Records every event, counting duplicates. A failing event does not stop the batch.
pub async fn process_payment_events(
    store: &dyn LeadStore,
    provider: PaymentProvider,
    events: Vec<PaymentWebhookEvent>,
) -> WebhookResponse {
    let total_received = events.len();
    tracing::info!("Processing {} {} event(s)", total_received, provider);

    let mut processed = 0;
    let mut duplicates = 0;

    for event in events {
        match process_payment_event(store, provider, event).await {
            Ok(ProcessResult::Processed) => {
                processed += 1;
            }
            Ok(ProcessResult::Duplicate) => {
                duplicates += 1;
                tracing::debug!("Skipped duplicate {} event", provider);
            }
            Err(e) => {
                tracing::error!("Failed to process {} event: {}", provider, e);
                // Continue processing other events even if one fails
            }
        }
    }

    tracing::info!(
        "Webhook processing complete: {} received, {} processed, {} duplicates",
        total_received,
        processed,
        duplicates
    );

    WebhookResponse {
        status: "received".to_string(),
        received: total_received,
        processed,
        duplicates,
    }
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(expected: Option<&str>, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(expected_secret) = expected else {
        return Ok(());
    };

    let token = headers
        .get("X-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug, PartialEq)]
enum ProcessResult {
    Processed,
    Duplicate,
}

async fn process_payment_event(
    store: &dyn LeadStore,
    provider: PaymentProvider,
    event: PaymentWebhookEvent,
) -> Result<ProcessResult, AppError> {
    let event_id = event.event_key().ok_or_else(|| {
        AppError::InvalidInput(format!("{} event without id or data.id", provider))
    })?;
    let event_type = event.kind().map(String::from);

    let payload = serde_json::to_value(&event).map_err(|e| {
        AppError::InvalidInput(format!("Failed to serialize {} event: {}", provider, e))
    })?;

    let inserted = store
        .record_payment_event(&PaymentEventRecord {
            provider: provider.as_str().to_string(),
            event_id: event_id.clone(),
            event_type,
            payload,
        })
        .await?;

    if inserted {
        tracing::debug!("Stored {} event {}", provider, event_id);
        Ok(ProcessResult::Processed)
    } else {
        Ok(ProcessResult::Duplicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryLeadStore;
    use axum::http::HeaderValue;

    fn event(json: &str) -> PaymentWebhookEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secreT"));
        assert!(!constant_time_compare("secret", "secret-longer"));
    }

    #[test]
    fn test_webhook_secret_validation() {
        let mut headers = HeaderMap::new();
        assert!(validate_webhook_secret(None, &headers).is_ok());
        assert!(matches!(
            validate_webhook_secret(Some("s3cr3t"), &headers),
            Err(AppError::Unauthorized(_))
        ));

        headers.insert("X-Webhook-Token", HeaderValue::from_static("wrong!"));
        assert!(validate_webhook_secret(Some("s3cr3t"), &headers).is_err());

        headers.insert("X-Webhook-Token", HeaderValue::from_static("s3cr3t"));
        assert!(validate_webhook_secret(Some("s3cr3t"), &headers).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_recorded_once() {
        let store = MemoryLeadStore::new();
        let events = vec![
            event(r#"{"id": "evt_1", "type": "payment_intent.succeeded"}"#),
            event(r#"{"id": "evt_1", "type": "payment_intent.succeeded"}"#),
            event(r#"{"id": "evt_2", "type": "charge.refunded"}"#),
            event(r#"{"type": "ping"}"#),
        ];

        let response = process_payment_events(&store, PaymentProvider::Stripe, events).await;

        assert_eq!(response.received, 4);
        assert_eq!(response.processed, 2);
        assert_eq!(response.duplicates, 1);
        assert_eq!(store.payment_events().len(), 2);

        // Redelivery of the whole batch changes nothing
        let again = process_payment_events(
            &store,
            PaymentProvider::Stripe,
            vec![event(r#"{"id": "evt_2", "type": "charge.refunded"}"#)],
        )
        .await;
        assert_eq!(again.processed, 0);
        assert_eq!(again.duplicates, 1);
    }

    fn state_with_secret(store: Arc<MemoryLeadStore>) -> State<Arc<AppState>> {
        let config = crate::config::Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://localhost/leads".to_string()),
            "PAYMENT_WEBHOOK_SECRET" => Some("s3cr3t".to_string()),
            _ => None,
        })
        .unwrap();
        State(Arc::new(AppState::from_config(config, store).unwrap()))
    }

    #[tokio::test]
    async fn test_token_is_checked_before_the_body() {
        let store = Arc::new(MemoryLeadStore::new());

        // Malformed body and unknown provider, no token: still 401
        let err = payment_webhook(
            state_with_secret(store.clone()),
            Path("paypal".to_string()),
            HeaderMap::new(),
            Bytes::from_static(b"{not json"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let mut headers = HeaderMap::new();
        headers.insert("X-Webhook-Token", HeaderValue::from_static("s3cr3t"));

        let err = payment_webhook(
            state_with_secret(store.clone()),
            Path("stripe".to_string()),
            headers.clone(),
            Bytes::from_static(b"{not json"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let (status, Json(response)) = payment_webhook(
            state_with_secret(store.clone()),
            Path("mercadopago".to_string()),
            headers,
            Bytes::from_static(br#"[{"id": 1, "type": "payment"}, {"id": 1}]"#),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.processed, 1);
        assert_eq!(response.duplicates, 1);
        assert_eq!(store.payment_events().len(), 1);
    }

    #[tokio::test]
    async fn test_same_id_from_different_providers_is_distinct() {
        let store = MemoryLeadStore::new();
        let stripe = process_payment_events(
            &store,
            PaymentProvider::Stripe,
            vec![event(r#"{"id": "42"}"#)],
        )
        .await;
        let mercadopago = process_payment_events(
            &store,
            PaymentProvider::MercadoPago,
            vec![event(r#"{"id": 42, "type": "payment"}"#)],
        )
        .await;

        assert_eq!(stripe.processed, 1);
        assert_eq!(mercadopago.processed, 1);
    }
}
