//! Campaign runs: discovery, enrichment, scoring and hot-lead messaging in sequence.
//!
//! A run moves the campaign `pendente → em_execucao → concluida`. Every
//! (source, region, specialty) discovery unit and every lead is processed
//! independently; a failing unit is logged and counted. Only a campaign that
//! cannot be loaded or marked as started fails the run.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::discovery::{build_query, discover};
use crate::enrichment::{enrich_lead, EnrichmentChannel, EnrichmentOutcome};
use crate::errors::AppError;
use crate::messaging::{render_template, MessagingService};
use crate::models::{Campaign, CampaignStatus, Lead, LeadStatus, SourceExecution, SourceKind};
use crate::scoring::{apply_score, ScoreOutcome, ScoringRules};
use crate::settle::settle_all;
use crate::sources::LeadSource;
use crate::store::LeadStore;

#[derive(Debug, Clone)]
struct DiscoveryUnit {
    source: SourceKind,
    region: String,
    specialty: Option<String>,
}

impl fmt::Display for DiscoveryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "discovery source={} region={}", self.source, self.region)?;
        if let Some(specialty) = &self.specialty {
            write!(f, " specialty={}", specialty)?;
        }
        Ok(())
    }
}

/// Hot lead queued for the messaging stage.
#[derive(Debug, Clone)]
struct Recipient(Lead);

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message to lead {}", self.0.id)
    }
}

/// Discovery totals for one source within a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRunSummary {
    pub source: SourceKind,
    pub leads_found: i64,
    pub units_succeeded: usize,
    pub units_failed: usize,
    /// No adapter was registered for this source, so it did not run.
    pub skipped: bool,
}

/// Counts reflect actual successes only.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignRunReport {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub discovered: usize,
    pub processed: usize,
    pub enriched: usize,
    pub scored: usize,
    pub hot: usize,
    pub warm: usize,
    pub cold: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
    pub leads_failed: usize,
    pub total_leads: i64,
    pub sources: Vec<SourceRunSummary>,
    pub errors: Vec<String>,
}

impl CampaignRunReport {
    fn started(campaign_id: Uuid) -> Self {
        Self {
            campaign_id,
            status: CampaignStatus::EmExecucao,
            discovered: 0,
            processed: 0,
            enriched: 0,
            scored: 0,
            hot: 0,
            warm: 0,
            cold: 0,
            messages_sent: 0,
            messages_failed: 0,
            leads_failed: 0,
            total_leads: 0,
            sources: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Enrichment plus scoring result for a single lead.
#[derive(Debug, Clone, Serialize)]
pub struct LeadProgress {
    pub lead: Lead,
    pub enrichment: Option<EnrichmentOutcome>,
    pub score: ScoreOutcome,
}

pub struct CampaignOrchestrator {
    store: Arc<dyn LeadStore>,
    sources: HashMap<SourceKind, Arc<dyn LeadSource>>,
    channels: Vec<Arc<dyn EnrichmentChannel>>,
    rules: ScoringRules,
    messaging: Option<MessagingService>,
}

impl CampaignOrchestrator {
    pub fn new(store: Arc<dyn LeadStore>, rules: ScoringRules) -> Self {
        Self {
            store,
            sources: HashMap::new(),
            channels: Vec::new(),
            rules,
            messaging: None,
        }
    }

    /// Registers a discovery adapter, replacing any previous one of the same kind.
    pub fn with_source(mut self, source: Arc<dyn LeadSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn EnrichmentChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_messaging(mut self, messaging: MessagingService) -> Self {
        self.messaging = Some(messaging);
        self
    }

    pub fn source(&self, kind: SourceKind) -> Option<&Arc<dyn LeadSource>> {
        self.sources.get(&kind)
    }

    pub fn channels(&self) -> &[Arc<dyn EnrichmentChannel>] {
        &self.channels
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    pub async fn run(&self, campaign_id: Uuid) -> Result<CampaignRunReport, AppError> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign_id)))?;

        if !campaign.active {
            return Err(AppError::InvalidInput(format!(
                "Campaign {} is not active",
                campaign_id
            )));
        }

        tracing::info!(
            "🚀 Campaign run started: {} ({}) sources={:?} regions={:?}",
            campaign.name,
            campaign.id,
            campaign.sources,
            campaign.regions
        );

        self.store
            .update_campaign_status(campaign.id, CampaignStatus::EmExecucao, None)
            .await?;

        let mut report = CampaignRunReport::started(campaign.id);

        self.run_discovery(&campaign, &mut report).await;
        let hot = self.run_qualification(&campaign, &mut report).await;
        self.run_messaging(&campaign, hot, &mut report).await;

        let total = match self.store.count_leads(campaign.id).await {
            Ok(total) => total,
            Err(e) => {
                // Previous total plus this run's discoveries
                let estimate = campaign.total_leads + report.discovered as i64;
                tracing::error!(
                    "Failed to count leads of campaign {}, using {}: {}",
                    campaign.id,
                    estimate,
                    e
                );
                report.errors.push(format!("counting leads: {}", e));
                estimate
            }
        };
        report.total_leads = total;

        match self
            .store
            .update_campaign_status(campaign.id, CampaignStatus::Concluida, Some(total))
            .await
        {
            Ok(()) => report.status = CampaignStatus::Concluida,
            Err(e) => {
                tracing::error!("Failed to mark campaign {} concluded: {}", campaign.id, e);
                report.errors.push(format!("marking campaign concluded: {}", e));
            }
        }

        tracing::info!(
            "✅ Campaign {} concluded: discovered={} enriched={} scored={} hot={} total={} errors={}",
            campaign.id,
            report.discovered,
            report.enriched,
            report.scored,
            report.hot,
            total,
            report.errors.len()
        );
        Ok(report)
    }

    /// Failures land in the report; one unit never stops the others.
    async fn run_discovery(&self, campaign: &Campaign, report: &mut CampaignRunReport) {
        let mut kinds: Vec<SourceKind> = Vec::new();
        for kind in &campaign.sources {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }

        for kind in kinds {
            let Some(source) = self.sources.get(&kind) else {
                tracing::warn!(
                    "Campaign {} enables source {} but no adapter is configured, skipping",
                    campaign.id,
                    kind
                );
                report.sources.push(SourceRunSummary {
                    source: kind,
                    leads_found: 0,
                    units_succeeded: 0,
                    units_failed: 0,
                    skipped: true,
                });
                continue;
            };

            let units: Vec<DiscoveryUnit> = campaign
                .regions
                .iter()
                .flat_map(|region| {
                    campaign
                        .discovery_targets()
                        .into_iter()
                        .map(move |specialty| DiscoveryUnit {
                            source: kind,
                            region: region.clone(),
                            specialty,
                        })
                })
                .collect();

            let settled = settle_all(units, |unit: DiscoveryUnit| {
                let store = self.store.clone();
                let source = source.clone();
                let city = campaign.city.clone();
                let campaign_id = campaign.id;
                async move {
                    let query =
                        build_query(unit.specialty, Some(unit.region), city, campaign_id)?;
                    let leads = discover(store.as_ref(), source.as_ref(), query).await?;
                    Ok::<usize, AppError>(leads.len())
                }
            })
            .await;

            let found: usize = settled.succeeded.iter().map(|(_, n)| n).sum();
            for (unit, e) in &settled.failed {
                report.errors.push(format!("{}: {}", unit, e));
            }

            let execution = SourceExecution {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                source: kind,
                leads_found: found as i64,
                status: CampaignStatus::Concluida,
                executed_at: chrono::Utc::now(),
            };
            if let Err(e) = self.store.record_source_execution(&execution).await {
                tracing::error!(
                    "Failed to record {} execution for campaign {}: {}",
                    kind,
                    campaign.id,
                    e
                );
                report.errors.push(format!("source execution {}: {}", kind, e));
            }

            tracing::info!(
                "Source {} done for campaign {}: {} lead(s), {}/{} unit(s) failed",
                kind,
                campaign.id,
                found,
                settled.failed.len(),
                settled.total()
            );

            report.discovered += found;
            report.sources.push(SourceRunSummary {
                source: kind,
                leads_found: found as i64,
                units_succeeded: settled.succeeded.len(),
                units_failed: settled.failed.len(),
                skipped: false,
            });
        }
    }

    /// Enriches and scores every `descoberto` lead; returns the ones classified `quente`.
    async fn run_qualification(
        &self,
        campaign: &Campaign,
        report: &mut CampaignRunReport,
    ) -> Vec<Lead> {
        let pending = match self
            .store
            .list_leads(campaign.id, Some(LeadStatus::Descoberto))
            .await
        {
            Ok(leads) => leads,
            Err(e) => {
                tracing::error!("Failed to load leads of campaign {}: {}", campaign.id, e);
                report.errors.push(format!("loading leads: {}", e));
                return Vec::new();
            }
        };

        tracing::info!(
            "Qualifying {} discovered lead(s) of campaign {}",
            pending.len(),
            campaign.id
        );

        let ids: Vec<Uuid> = pending.iter().map(|l| l.id).collect();
        let settled = settle_all(ids, |id| self.qualify_lead(id, None)).await;

        report.processed = settled.total();
        report.leads_failed = settled.failed.len();
        for (id, e) in &settled.failed {
            report.errors.push(format!("lead {}: {}", id, e));
        }

        let mut hot = Vec::new();
        for (_, progress) in settled.succeeded {
            if progress
                .enrichment
                .as_ref()
                .map(EnrichmentOutcome::enriched)
                .unwrap_or(false)
            {
                report.enriched += 1;
            }
            report.scored += 1;
            match progress.score.status {
                LeadStatus::Quente => {
                    report.hot += 1;
                    hot.push(progress.lead);
                }
                LeadStatus::Morno => report.warm += 1,
                _ => report.cold += 1,
            }
        }
        hot
    }

    async fn run_messaging(
        &self,
        campaign: &Campaign,
        hot: Vec<Lead>,
        report: &mut CampaignRunReport,
    ) {
        let (Some(messaging), Some(template)) = (&self.messaging, &campaign.message_template)
        else {
            return;
        };
        if template.trim().is_empty() {
            return;
        }

        let recipients: Vec<Recipient> = hot
            .into_iter()
            .filter(|l| l.phone.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false))
            .map(Recipient)
            .collect();

        let settled = settle_all(recipients, |Recipient(lead)| async move {
            messaging
                .send_to_lead(&lead, &render_template(template, &lead))
                .await
        })
        .await;

        report.messages_sent = settled.succeeded.len();
        report.messages_failed = settled.failed.len();
        for (recipient, e) in &settled.failed {
            report.errors.push(format!("{}: {}", recipient, e));
        }
    }

    /// Enriches then scores one lead, persisting both steps.
    ///
    /// Channel failures are absorbed inside enrichment; store failures abort this lead.
    pub async fn qualify_lead(
        &self,
        lead_id: Uuid,
        name: Option<&str>,
    ) -> Result<LeadProgress, AppError> {
        let enrichment = enrich_lead(self.store.as_ref(), &self.channels, lead_id, name).await?;
        let mut lead = enrichment.lead.clone();
        let score = apply_score(&mut lead, &self.rules);
        self.store.save_score(lead.id, &score).await?;

        tracing::debug!(
            "Lead {} scored {} ({}) [{}]",
            lead.id,
            score.score,
            score.status,
            score.justification
        );
        Ok(LeadProgress {
            lead,
            enrichment: Some(enrichment),
            score,
        })
    }

    /// Scores a stored lead as it is, without enrichment.
    pub async fn score_stored_lead(&self, lead_id: Uuid) -> Result<LeadProgress, AppError> {
        let mut lead = self
            .store
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;
        let score = apply_score(&mut lead, &self.rules);
        self.store.save_score(lead.id, &score).await?;
        Ok(LeadProgress {
            lead,
            enrichment: None,
            score,
        })
    }
}
