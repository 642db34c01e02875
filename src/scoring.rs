//! Lead qualification scoring.
//!
//! A lead's score is the sum of fixed weights for the attributes it carries.
//! The tier follows from two thresholds: `quente` at 80 and above, `morno` at
//! 50 and above, `frio` otherwise. Everything here is pure; persisting the
//! outcome is the caller's job.

use serde::Serialize;

use crate::config::{Config, DEFAULT_MAJOR_CITIES};
use crate::models::{Lead, LeadStatus};

pub const HOT_THRESHOLD: i32 = 80;
pub const WARM_THRESHOLD: i32 = 50;

pub const WEIGHT_REGISTRY: i32 = 20;
pub const WEIGHT_SPECIALTY: i32 = 15;
pub const WEIGHT_OWN_OFFICE: i32 = 25;
pub const WEIGHT_EMAIL: i32 = 10;
pub const WEIGHT_PHONE: i32 = 10;
pub const WEIGHT_SOCIAL: i32 = 10;
pub const WEIGHT_FOLLOWERS: i32 = 10;
pub const WEIGHT_WEBSITE: i32 = 20;
pub const WEIGHT_MAJOR_CITY: i32 = 10;

/// Highest score a lead can reach.
pub const MAX_SCORE: i32 = WEIGHT_REGISTRY
    + WEIGHT_SPECIALTY
    + WEIGHT_OWN_OFFICE
    + WEIGHT_EMAIL
    + WEIGHT_PHONE
    + WEIGHT_SOCIAL
    + WEIGHT_FOLLOWERS
    + WEIGHT_WEBSITE
    + WEIGHT_MAJOR_CITY;

const JUSTIFICATION_SEPARATOR: &str = " | ";

/// Tunable inputs of the scoring rule.
#[derive(Debug, Clone)]
pub struct ScoringRules {
    /// Followers strictly above this earn the follower bonus.
    pub follower_threshold: i64,
    /// Cities (or regions) that earn the major-city bonus. Compared case-insensitively.
    pub major_cities: Vec<String>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            follower_threshold: 1000,
            major_cities: DEFAULT_MAJOR_CITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ScoringRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            follower_threshold: config.follower_threshold,
            major_cities: config.major_cities.clone(),
        }
    }

    fn is_major_city(&self, lead: &Lead) -> bool {
        let matches = |value: &str| {
            let value = value.trim().to_lowercase();
            !value.is_empty()
                && self
                    .major_cities
                    .iter()
                    .any(|c| c.trim().to_lowercase() == value)
        };

        lead.city.as_deref().map(matches).unwrap_or(false) || matches(&lead.region)
    }
}

/// Derived fields the scoring step writes back onto a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreOutcome {
    pub score: i32,
    pub status: LeadStatus,
    /// Matched rule labels in evaluation order, pipe-separated. Empty when nothing matched.
    pub justification: String,
}

/// Maps a score onto its tier.
pub fn classify(score: i32) -> LeadStatus {
    if score >= HOT_THRESHOLD {
        LeadStatus::Quente
    } else if score >= WARM_THRESHOLD {
        LeadStatus::Morno
    } else {
        LeadStatus::Frio
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Computes score, tier and justification for a lead.
///
/// Only reads the lead's attributes, so re-scoring an unchanged lead yields the same outcome.
pub fn score_lead(lead: &Lead, rules: &ScoringRules) -> ScoreOutcome {
    let mut score = 0;
    let mut labels: Vec<String> = Vec::new();
    let mut hit = |weight: i32, label: String| {
        score += weight;
        labels.push(label);
    };

    if present(&lead.registry_number) {
        hit(WEIGHT_REGISTRY, "CRM ativo".to_string());
    }
    if present(&lead.specialty) {
        hit(WEIGHT_SPECIALTY, "Especialidade definida".to_string());
    }
    if lead.has_own_office == Some(true) {
        hit(WEIGHT_OWN_OFFICE, "Consultório próprio".to_string());
    }
    if present(&lead.email) {
        hit(WEIGHT_EMAIL, "Email disponível".to_string());
    }
    if present(&lead.phone) {
        hit(WEIGHT_PHONE, "Telefone disponível".to_string());
    }
    if present(&lead.instagram_handle) || present(&lead.linkedin_url) {
        hit(WEIGHT_SOCIAL, "Presença em redes sociais".to_string());
        if lead.instagram_followers.unwrap_or(0) > rules.follower_threshold {
            hit(
                WEIGHT_FOLLOWERS,
                format!("Mais de {} seguidores", rules.follower_threshold),
            );
        }
    }
    if present(&lead.website) {
        hit(WEIGHT_WEBSITE, "Site próprio".to_string());
    }
    if rules.is_major_city(lead) {
        hit(WEIGHT_MAJOR_CITY, "Grande centro".to_string());
    }

    ScoreOutcome {
        score,
        status: classify(score),
        justification: labels.join(JUSTIFICATION_SEPARATOR),
    }
}

/// Scores a lead and writes the three derived fields onto it.
pub fn apply_score(lead: &mut Lead, rules: &ScoringRules) -> ScoreOutcome {
    let outcome = score_lead(lead, rules);
    lead.score = outcome.score;
    lead.status = outcome.status;
    lead.justification = Some(outcome.justification.clone());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewLead, SourceKind};
    use uuid::Uuid;

    fn bare_lead(region: &str) -> Lead {
        NewLead {
            campaign_id: Uuid::new_v4(),
            full_name: "Carlos Lima".to_string(),
            region: region.to_string(),
            ..Default::default()
        }
        .into_lead(SourceKind::Cfm)
    }

    #[test]
    fn lead_without_attributes_is_cold_with_empty_justification() {
        let lead = bare_lead("AC");
        let outcome = score_lead(&lead, &ScoringRules::default());

        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.status, LeadStatus::Frio);
        assert_eq!(outcome.justification, "");
    }

    #[test]
    fn fully_qualified_lead_reaches_max_score() {
        let mut lead = bare_lead("SP");
        lead.city = Some("são paulo".to_string());
        lead.registry_number = Some("CRM/SP 123456".to_string());
        lead.specialty = Some("Dermatologia".to_string());
        lead.has_own_office = Some(true);
        lead.email = Some("carlos@clinica.com.br".to_string());
        lead.phone = Some("11987654321".to_string());
        lead.instagram_handle = Some("@drcarlos".to_string());
        lead.instagram_followers = Some(5200);
        lead.website = Some("https://drcarlos.com.br".to_string());

        let outcome = score_lead(&lead, &ScoringRules::default());
        assert_eq!(outcome.score, MAX_SCORE);
        assert_eq!(outcome.status, LeadStatus::Quente);
        assert_eq!(
            outcome.justification,
            "CRM ativo | Especialidade definida | Consultório próprio | Email disponível | \
             Telefone disponível | Presença em redes sociais | Mais de 1000 seguidores | \
             Site próprio | Grande centro"
        );
    }

    #[test]
    fn follower_bonus_needs_social_presence_and_strictly_more_than_threshold() {
        let mut lead = bare_lead("AC");
        lead.instagram_followers = Some(50_000);
        assert_eq!(score_lead(&lead, &ScoringRules::default()).score, 0);

        lead.instagram_handle = Some("@dra.ana".to_string());
        lead.instagram_followers = Some(1000);
        assert_eq!(score_lead(&lead, &ScoringRules::default()).score, WEIGHT_SOCIAL);

        lead.instagram_followers = Some(1001);
        assert_eq!(
            score_lead(&lead, &ScoringRules::default()).score,
            WEIGHT_SOCIAL + WEIGHT_FOLLOWERS
        );
    }

    #[test]
    fn thresholds_split_tiers() {
        assert_eq!(classify(0), LeadStatus::Frio);
        assert_eq!(classify(49), LeadStatus::Frio);
        assert_eq!(classify(50), LeadStatus::Morno);
        assert_eq!(classify(79), LeadStatus::Morno);
        assert_eq!(classify(80), LeadStatus::Quente);
        assert_eq!(classify(MAX_SCORE), LeadStatus::Quente);
    }

    #[test]
    fn blank_strings_do_not_count_as_present() {
        let mut lead = bare_lead("AC");
        lead.email = Some("   ".to_string());
        lead.specialty = Some(String::new());
        assert_eq!(score_lead(&lead, &ScoringRules::default()).score, 0);
    }

    #[test]
    fn apply_score_is_idempotent() {
        let mut lead = bare_lead("RJ");
        lead.city = Some("Rio de Janeiro".to_string());
        lead.registry_number = Some("CRM/RJ 99887".to_string());
        lead.phone = Some("21987654321".to_string());
        let rules = ScoringRules::default();

        let first = apply_score(&mut lead, &rules);
        let snapshot = lead.clone();
        let second = apply_score(&mut lead, &rules);

        assert_eq!(first, second);
        assert_eq!(lead, snapshot);
        assert_eq!(first.score, WEIGHT_REGISTRY + WEIGHT_PHONE + WEIGHT_MAJOR_CITY);
        assert_eq!(lead.status, LeadStatus::Frio);
    }
}
