//! Persistence seam for the lead pipeline.
//!
//! `PgLeadStore` (see `db_storage`) talks to Postgres; `MemoryLeadStore`
//! (see `memory_store`) keeps everything in process for tests.
//! Both implementations must honour the same contract:
//!
//! - `apply_enrichment` only fills columns that are still empty, and moves the
//!   status from `descoberto` to `enriquecido` but never backwards.
//! - `record_payment_event` returns `false` when the (provider, event id) pair
//!   was already recorded.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Campaign, CampaignStatus, Lead, LeadStatus, MessageLog, NewLead, SourceExecution, SourceKind,
};
use crate::scoring::ScoreOutcome;

/// Attributes an enrichment channel can contribute to a lead.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LeadEnrichment {
    pub registry_number: Option<String>,
    pub specialty: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub instagram_followers: Option<i64>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub has_own_office: Option<bool>,
}

/// A payment provider notification, stored once per (provider, event id).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PaymentEventRecord {
    pub provider: String,
    pub event_id: String,
    pub event_type: Option<String>,
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError>;

    /// Sets the run status; `total_leads` is written when provided.
    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
        total_leads: Option<i64>,
    ) -> Result<(), AppError>;

    /// Bulk-inserts discovered leads with status `descoberto` and the baseline score.
    async fn insert_leads(
        &self,
        source: SourceKind,
        leads: Vec<NewLead>,
    ) -> Result<Vec<Lead>, AppError>;

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    async fn list_leads(
        &self,
        campaign_id: Uuid,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError>;

    async fn count_leads(&self, campaign_id: Uuid) -> Result<i64, AppError>;

    /// Merges enrichment onto a lead without overwriting populated fields. Returns the stored lead.
    async fn apply_enrichment(
        &self,
        lead_id: Uuid,
        enrichment: &LeadEnrichment,
    ) -> Result<Lead, AppError>;

    async fn save_score(&self, lead_id: Uuid, outcome: &ScoreOutcome) -> Result<(), AppError>;

    async fn record_source_execution(&self, record: &SourceExecution) -> Result<(), AppError>;

    async fn log_message(&self, log: &MessageLog) -> Result<(), AppError>;

    /// Returns `true` if the event was new, `false` for a duplicate delivery.
    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<bool, AppError>;
}
