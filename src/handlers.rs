use crate::config::Config;
use crate::discovery::discover;
use crate::enrichment::{enrich_lead, EnrichmentChannel, EnrichmentOutcome, SocialProfileChannel};
use crate::errors::AppError;
use crate::gateway_client::WhatsAppGatewayClient;
use crate::messaging::{MessagingService, SendOutcome};
use crate::models::*;
use crate::orchestrator::{CampaignOrchestrator, CampaignRunReport, LeadProgress};
use crate::roi::{calculate_roi as compute_roi, RoiInput, RoiReport};
use crate::scoring::ScoringRules;
use crate::services::{CfmRegistryClient, SocialPlatform, SocialSearchClient};
use crate::sources::{CfmRegistrySource, MockLeadSource, SocialProfileSource};
use crate::store::LeadStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Lead and campaign persistence.
    pub store: Arc<dyn LeadStore>,
    /// Campaign pipeline with every configured source and channel.
    pub orchestrator: CampaignOrchestrator,
    /// WhatsApp messaging (optional, needs the gateway keys).
    pub messaging: Option<MessagingService>,
}

impl AppState {
    /// Wires every adapter whose credentials are present in `config`.
    ///
    /// Absent groups leave the matching source or channel unregistered; a
    /// present but unusable group fails with `Configuration`.
    pub fn from_config(config: Config, store: Arc<dyn LeadStore>) -> Result<Self, AppError> {
        let mut orchestrator =
            CampaignOrchestrator::new(store.clone(), ScoringRules::from_config(&config));

        if config.cfm_registry.is_some() {
            let client = CfmRegistryClient::from_config(&config)?;
            orchestrator = orchestrator.with_source(Arc::new(CfmRegistrySource::new(client)));
            tracing::info!("✓ CFM registry source enabled");
        } else {
            tracing::warn!("CFM registry not configured, registry discovery disabled");
        }

        if config.social_search.is_some() {
            let client = SocialSearchClient::from_config(&config)?;
            for platform in [SocialPlatform::Instagram, SocialPlatform::Linkedin] {
                let channel: Arc<dyn EnrichmentChannel> =
                    Arc::new(SocialProfileChannel::new(client.clone(), platform));
                orchestrator = orchestrator
                    .with_source(Arc::new(SocialProfileSource::new(client.clone(), platform)))
                    .with_channel(channel);
            }
            tracing::info!("✓ Social search sources and enrichment channels enabled");
        } else {
            tracing::warn!("Social search not configured, Instagram/LinkedIn disabled");
        }

        if config.use_mock_sources {
            tracing::warn!(
                "⚠️ USE_MOCK_SOURCES is on: campaigns listing 'mock' get synthetic leads ({} per query)",
                config.mock_leads_per_query
            );
            orchestrator = orchestrator
                .with_source(Arc::new(MockLeadSource::new(config.mock_leads_per_query)));
        }

        let messaging = match &config.whatsapp_gateway {
            Some(_) => {
                let gateway = WhatsAppGatewayClient::from_config(&config)?;
                tracing::info!("✓ WhatsApp gateway client initialized");
                Some(MessagingService::new(Arc::new(gateway), store.clone()))
            }
            None => {
                tracing::warn!("WhatsApp gateway not configured, messaging disabled");
                None
            }
        };
        if let Some(messaging) = &messaging {
            orchestrator = orchestrator.with_messaging(messaging.clone());
        }

        if config.payment_webhook_secret.is_none() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, payment webhooks are unauthenticated");
        }

        Ok(Self {
            config,
            store,
            orchestrator,
            messaging,
        })
    }
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-campaign-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/campaigns/:id/run
///
/// Runs the whole pipeline for a campaign and returns the run report.
/// Partial failures are reported inside the envelope, not as an HTTP error.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The campaign UUID.
///
/// # Returns
///
/// * `Result<Json<serde_json::Value>, AppError>` - `{success, report}` or an error when the campaign cannot be loaded.
pub async fn run_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /campaigns/{}/run", id);

    let report: CampaignRunReport = state.orchestrator.run(id).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

/// GET /api/v1/campaigns/:id/leads?status=
///
/// Lists the leads of a campaign, optionally filtered by pipeline status.
pub async fn list_campaign_leads(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<LeadListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<LeadStatus>)
        .transpose()?;

    if state.store.get_campaign(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Campaign {} not found", id)));
    }

    let leads = state.store.list_leads(id, status).await?;
    tracing::debug!("Campaign {}: {} lead(s) with status {:?}", id, leads.len(), status);

    Ok(Json(json!({
        "campaign_id": id,
        "total": leads.len(),
        "leads": leads
    })))
}

/// POST /api/v1/discovery/:source
///
/// Runs one discovery adapter (`cfm`, `instagram`, `linkedin` or `mock`) and persists the leads.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `source` - Source name from the path.
/// * `payload` - Specialty, region (required), city and campaign id.
///
/// # Returns
///
/// * `Result<Json<DiscoveryResponse>, AppError>` - The stored leads.
pub async fn discover_leads(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Json(payload): Json<DiscoveryRequest>,
) -> Result<Json<DiscoveryResponse>, AppError> {
    let kind: SourceKind = source.parse()?;
    tracing::info!("POST /discovery/{} - campaign {}", kind, payload.campaign_id);

    let query = payload.into_query()?;
    let adapter = state.orchestrator.source(kind).ok_or_else(|| {
        AppError::Configuration(format!("Discovery source '{}' is not configured", kind))
    })?;

    let leads = discover(state.store.as_ref(), adapter.as_ref(), query).await?;

    Ok(Json(DiscoveryResponse {
        success: true,
        source: kind,
        total: leads.len(),
        leads,
    }))
}

/// POST /api/v1/leads/:id/enrich
///
/// Runs every enrichment channel for one lead. The body is optional; `name`
/// overrides the stored full name for lookups.
pub async fn enrich_single_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<EnrichRequest>>,
) -> Result<Json<EnrichmentOutcome>, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    tracing::info!("POST /leads/{}/enrich", id);

    let outcome = enrich_lead(
        state.store.as_ref(),
        state.orchestrator.channels(),
        id,
        request.name.as_deref(),
    )
    .await?;

    Ok(Json(outcome))
}

/// POST /api/v1/leads/:id/score
pub async fn score_single_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadProgress>, AppError> {
    tracing::info!("POST /leads/{}/score", id);
    Ok(Json(state.orchestrator.score_stored_lead(id).await?))
}

/// POST /api/v1/leads/:id/messages
///
/// Sends a WhatsApp message to the lead and records it in the message log.
pub async fn send_lead_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SendOutcome>, AppError> {
    let messaging = state.messaging.as_ref().ok_or_else(|| {
        AppError::Configuration("WhatsApp gateway is not configured".to_string())
    })?;

    let lead = state
        .store
        .get_lead(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    let outcome = messaging.send_to_lead(&lead, &payload.body).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/roi
///
/// Revenue, profit, ROI, margin and break-even for a campaign budget.
pub async fn calculate_roi(Json(payload): Json<RoiInput>) -> Result<Json<RoiReport>, AppError> {
    Ok(Json(compute_roi(&payload)?))
}
