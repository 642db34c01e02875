use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::AppError;

/// Score every freshly discovered lead starts with.
pub const BASELINE_DISCOVERY_SCORE: i32 = 20;

// ============ Pipeline States ============

/// Position of a lead in the qualification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Descoberto,
    Enriquecido,
    Quente,
    Morno,
    Frio,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Descoberto => "descoberto",
            LeadStatus::Enriquecido => "enriquecido",
            LeadStatus::Quente => "quente",
            LeadStatus::Morno => "morno",
            LeadStatus::Frio => "frio",
        }
    }

    /// True once the scoring step has classified the lead.
    pub fn is_scored(&self) -> bool {
        matches!(
            self,
            LeadStatus::Quente | LeadStatus::Morno | LeadStatus::Frio
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "descoberto" => Ok(LeadStatus::Descoberto),
            "enriquecido" => Ok(LeadStatus::Enriquecido),
            "quente" => Ok(LeadStatus::Quente),
            "morno" => Ok(LeadStatus::Morno),
            "frio" => Ok(LeadStatus::Frio),
            other => Err(AppError::InvalidInput(format!(
                "Unknown lead status '{}'",
                other
            ))),
        }
    }
}

/// Campaign run lifecycle: `pendente → em_execucao → concluida`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pendente,
    EmExecucao,
    Concluida,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pendente => "pendente",
            CampaignStatus::EmExecucao => "em_execucao",
            CampaignStatus::Concluida => "concluida",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(CampaignStatus::Pendente),
            "em_execucao" => Ok(CampaignStatus::EmExecucao),
            "concluida" => Ok(CampaignStatus::Concluida),
            other => Err(AppError::InvalidInput(format!(
                "Unknown campaign status '{}'",
                other
            ))),
        }
    }
}

/// Discovery sources a campaign can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Federal medical council registry.
    Cfm,
    Instagram,
    Linkedin,
    /// Deterministic synthetic leads, for tests and dry runs.
    Mock,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Cfm => "cfm",
            SourceKind::Instagram => "instagram",
            SourceKind::Linkedin => "linkedin",
            SourceKind::Mock => "mock",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cfm" => Ok(SourceKind::Cfm),
            "instagram" => Ok(SourceKind::Instagram),
            "linkedin" => Ok(SourceKind::Linkedin),
            "mock" => Ok(SourceKind::Mock),
            other => Err(AppError::InvalidInput(format!(
                "Unknown lead source '{}'",
                other
            ))),
        }
    }
}

// ============ Domain Models ============

/// A prospect moving through discovery, enrichment and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub full_name: String,
    /// Professional registry number, e.g. `CRM/SP 123456`.
    pub registry_number: Option<String>,
    pub profession: Option<String>,
    pub specialty: Option<String>,
    /// State (UF) the lead was discovered in.
    pub region: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub instagram_followers: Option<i64>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub has_own_office: Option<bool>,
    pub source: SourceKind,
    pub status: LeadStatus,
    pub score: i32,
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalized lead shape produced by a discovery source, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub campaign_id: Uuid,
    pub full_name: String,
    pub registry_number: Option<String>,
    pub profession: Option<String>,
    pub specialty: Option<String>,
    pub region: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub instagram_followers: Option<i64>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub has_own_office: Option<bool>,
}

impl NewLead {
    /// Materializes the record the store will hold: status `descoberto`, baseline score.
    pub fn into_lead(self, source: SourceKind) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            campaign_id: self.campaign_id,
            full_name: self.full_name,
            registry_number: self.registry_number,
            profession: self.profession,
            specialty: self.specialty,
            region: self.region,
            city: self.city,
            phone: self.phone,
            email: self.email,
            instagram_handle: self.instagram_handle,
            instagram_followers: self.instagram_followers,
            linkedin_url: self.linkedin_url,
            website: self.website,
            has_own_office: self.has_own_office,
            source,
            status: LeadStatus::Descoberto,
            score: BASELINE_DISCOVERY_SCORE,
            justification: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// A targeting profile that owns a batch of leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub professions: Vec<String>,
    pub specialties: Vec<String>,
    /// Target states (UF).
    pub regions: Vec<String>,
    pub city: Option<String>,
    pub sources: Vec<SourceKind>,
    pub active: bool,
    pub status: CampaignStatus,
    pub total_leads: i64,
    /// WhatsApp message sent to hot leads after scoring. `{nome}` is replaced by the lead name.
    pub message_template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Specialty/profession values discovery is run for. `None` lets each source apply its fallback.
    pub fn discovery_targets(&self) -> Vec<Option<String>> {
        let targets: Vec<Option<String>> = if !self.specialties.is_empty() {
            self.specialties.iter().cloned().map(Some).collect()
        } else {
            self.professions.iter().cloned().map(Some).collect()
        };

        if targets.is_empty() {
            vec![None]
        } else {
            targets
        }
    }
}

/// Audit row for one (campaign, source) discovery run. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExecution {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub source: SourceKind,
    pub leads_found: i64,
    pub status: CampaignStatus,
    pub executed_at: DateTime<Utc>,
}

/// Delivery outcome recorded for every gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Enviado,
    Falha,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Enviado => "enviado",
            MessageStatus::Falha => "falha",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub phone: String,
    pub body: String,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

// ============ Database Rows ============

/// Raw `leads` row; enum columns are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub full_name: String,
    pub registry_number: Option<String>,
    pub profession: Option<String>,
    pub specialty: Option<String>,
    pub region: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub instagram_handle: Option<String>,
    pub instagram_followers: Option<i64>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub has_own_office: Option<bool>,
    pub source: String,
    pub status: String,
    pub score: i32,
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = AppError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: row.id,
            campaign_id: row.campaign_id,
            full_name: row.full_name,
            registry_number: row.registry_number,
            profession: row.profession,
            specialty: row.specialty,
            region: row.region,
            city: row.city,
            phone: row.phone,
            email: row.email,
            instagram_handle: row.instagram_handle,
            instagram_followers: row.instagram_followers,
            linkedin_url: row.linkedin_url,
            website: row.website,
            has_own_office: row.has_own_office,
            source: row.source.parse()?,
            status: row.status.parse()?,
            score: row.score,
            justification: row.justification,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Raw `campaigns` row.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub name: String,
    pub professions: Vec<String>,
    pub specialties: Vec<String>,
    pub regions: Vec<String>,
    pub city: Option<String>,
    pub sources: Vec<String>,
    pub active: bool,
    pub status: String,
    pub total_leads: i64,
    pub message_template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = AppError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        // An unknown source name is a configuration problem of that campaign only
        let sources = row
            .sources
            .iter()
            .filter_map(|s| match s.parse::<SourceKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    tracing::warn!("Campaign {} lists unknown source '{}'", row.id, s);
                    None
                }
            })
            .collect();

        Ok(Campaign {
            id: row.id,
            name: row.name,
            professions: row.professions,
            specialties: row.specialties,
            regions: row.regions,
            city: row.city,
            sources,
            active: row.active,
            status: row.status.parse()?,
            total_leads: row.total_leads,
            message_template: row.message_template,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============ API Request/Response Models ============

/// Request payload for a single discovery adapter invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryRequest {
    /// Profession or specialty to search for.
    #[serde(alias = "especialidade")]
    pub specialty: Option<String>,
    /// State (UF). Required.
    #[serde(alias = "estado")]
    pub region: Option<String>,
    #[serde(alias = "cidade")]
    pub city: Option<String>,
    #[serde(alias = "campanha_id")]
    pub campaign_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub success: bool,
    pub source: SourceKind,
    pub total: usize,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrichRequest {
    /// Name to look the lead up by; defaults to the stored full name.
    #[serde(alias = "nome")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_storage_names() {
        for status in [
            LeadStatus::Descoberto,
            LeadStatus::Enriquecido,
            LeadStatus::Quente,
            LeadStatus::Morno,
            LeadStatus::Frio,
        ] {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_value(CampaignStatus::EmExecucao).unwrap(),
            serde_json::json!("em_execucao")
        );
    }

    #[test]
    fn new_lead_starts_discovered_with_baseline_score() {
        let lead = NewLead {
            campaign_id: Uuid::new_v4(),
            full_name: "Ana Souza".to_string(),
            region: "SP".to_string(),
            ..Default::default()
        }
        .into_lead(SourceKind::Cfm);

        assert_eq!(lead.status, LeadStatus::Descoberto);
        assert_eq!(lead.score, BASELINE_DISCOVERY_SCORE);
        assert!(!lead.status.is_scored());
    }

    #[test]
    fn discovery_targets_prefer_specialties_then_professions() {
        let mut campaign = Campaign {
            id: Uuid::new_v4(),
            name: "Dermato SP".to_string(),
            professions: vec!["medico".to_string()],
            specialties: vec!["Dermatologia".to_string()],
            regions: vec!["SP".to_string()],
            city: None,
            sources: vec![SourceKind::Cfm],
            active: true,
            status: CampaignStatus::Pendente,
            total_leads: 0,
            message_template: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(
            campaign.discovery_targets(),
            vec![Some("Dermatologia".to_string())]
        );

        campaign.specialties.clear();
        assert_eq!(campaign.discovery_targets(), vec![Some("medico".to_string())]);

        campaign.professions.clear();
        assert_eq!(campaign.discovery_targets(), vec![None]);
    }
}
