//! In-process `LeadStore` for the test suites and the orchestrator scenarios.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::enrichment::merge_enrichment;
use crate::errors::AppError;
use crate::models::{
    Campaign, CampaignStatus, Lead, LeadStatus, MessageLog, NewLead, SourceExecution, SourceKind,
};
use crate::scoring::ScoreOutcome;
use crate::store::{LeadEnrichment, LeadStore, PaymentEventRecord};

#[derive(Debug, Default)]
struct Tables {
    campaigns: HashMap<Uuid, Campaign>,
    /// Insertion order is kept so listings are stable.
    leads: Vec<Lead>,
    executions: Vec<SourceExecution>,
    messages: Vec<MessageLog>,
    payment_keys: HashSet<(String, String)>,
    payments: Vec<PaymentEventRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    tables: Mutex<Tables>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign(campaign: Campaign) -> Self {
        let store = Self::new();
        store.put_campaign(campaign);
        store
    }

    pub fn put_campaign(&self, campaign: Campaign) {
        self.lock().campaigns.insert(campaign.id, campaign);
    }

    pub fn source_executions(&self) -> Vec<SourceExecution> {
        self.lock().executions.clone()
    }

    pub fn message_logs(&self) -> Vec<MessageLog> {
        self.lock().messages.clone()
    }

    pub fn payment_events(&self) -> Vec<PaymentEventRecord> {
        self.lock().payments.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock only means another test thread panicked mid-write
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(self.lock().campaigns.get(&id).cloned())
    }

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
        total_leads: Option<i64>,
    ) -> Result<(), AppError> {
        let mut tables = self.lock();
        let campaign = tables
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))?;
        campaign.status = status;
        if let Some(total) = total_leads {
            campaign.total_leads = total;
        }
        campaign.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_leads(
        &self,
        source: SourceKind,
        leads: Vec<NewLead>,
    ) -> Result<Vec<Lead>, AppError> {
        let stored: Vec<Lead> = leads.into_iter().map(|l| l.into_lead(source)).collect();
        self.lock().leads.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        Ok(self.lock().leads.iter().find(|l| l.id == id).cloned())
    }

    async fn list_leads(
        &self,
        campaign_id: Uuid,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError> {
        Ok(self
            .lock()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .filter(|l| status.map(|s| l.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn count_leads(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .lock()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .count() as i64)
    }

    async fn apply_enrichment(
        &self,
        lead_id: Uuid,
        enrichment: &LeadEnrichment,
    ) -> Result<Lead, AppError> {
        let mut tables = self.lock();
        let lead = tables
            .leads
            .iter_mut()
            .find(|l| l.id == lead_id)
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

        merge_enrichment(lead, enrichment);
        lead.updated_at = Some(Utc::now());
        Ok(lead.clone())
    }

    async fn save_score(&self, lead_id: Uuid, outcome: &ScoreOutcome) -> Result<(), AppError> {
        let mut tables = self.lock();
        let lead = tables
            .leads
            .iter_mut()
            .find(|l| l.id == lead_id)
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

        lead.score = outcome.score;
        lead.status = outcome.status;
        lead.justification = Some(outcome.justification.clone());
        lead.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn record_source_execution(&self, record: &SourceExecution) -> Result<(), AppError> {
        self.lock().executions.push(record.clone());
        Ok(())
    }

    async fn log_message(&self, log: &MessageLog) -> Result<(), AppError> {
        self.lock().messages.push(log.clone());
        Ok(())
    }

    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<bool, AppError> {
        let mut tables = self.lock();
        let key = (event.provider.clone(), event.event_id.clone());
        if !tables.payment_keys.insert(key) {
            return Ok(false);
        }
        tables.payments.push(event.clone());
        Ok(true)
    }
}
