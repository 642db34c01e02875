/// Lead enrichment: contact validation, non-destructive merging and per-channel lookups.
///
/// The enrichment step for one lead:
/// 1. Ask every applicable channel for extra attributes
/// 2. Drop invalid phones/emails from each answer
/// 3. Merge what is left onto the lead, filling only empty fields
/// 4. Advance the lead from `descoberto` to `enriquecido`
///
/// A failing channel is logged and skipped; it never fails the lead.
use async_trait::async_trait;
use moka::future::Cache;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use uuid::Uuid;

use crate::cache_validator::ValidatedCacheEntry;
use crate::errors::AppError;
use crate::models::{Lead, LeadStatus};
use crate::services::{SocialPlatform, SocialProfile, SocialSearchClient};
use crate::store::{LeadEnrichment, LeadStore};

/// Validate email address
///
/// Checks for:
/// - Basic email format (contains @ and .)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length requirements
/// - Valid domain structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::warn!(
                "❌ Invalid email detected (fake pattern '{}'): {}",
                pattern,
                email
            );
            return false;
        }
    }

    // RFC 5322 simplified: local@domain.tld
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let email_regex = EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email pattern is a valid regex")
    });

    if !email_regex.is_match(email) {
        tracing::warn!("❌ Invalid email format: {}", email);
        return false;
    }

    true
}

/// Validate and normalize a Brazilian phone number to E.164 (`+5511987654321`).
///
/// Uses the phonenumber crate (port of Google's libphonenumber) with region BR.
pub fn validate_br_phone(raw: &str) -> Result<String, AppError> {
    if raw.trim().is_empty() || raw.len() < 8 {
        return Err(AppError::InvalidInput("Phone too short".to_string()));
    }

    let number = phonenumber::parse(Some(CountryId::BR), raw).map_err(|e| {
        tracing::warn!("❌ Failed to parse BR phone '{}': {:?}", raw, e);
        AppError::InvalidInput(format!("Unparseable phone number: {:?}", e))
    })?;

    if !phonenumber::is_valid(&number) {
        tracing::warn!("❌ Invalid BR phone number: {}", raw);
        return Err(AppError::InvalidInput(
            "Invalid Brazilian phone number".to_string(),
        ));
    }

    let formatted = number.format().mode(Mode::E164).to_string();
    tracing::debug!("✓ Valid BR phone: {} → {}", raw, formatted);
    Ok(formatted)
}

/// Phone as the messaging gateway expects it: digits only, country code first (`5511987654321`).
pub fn normalize_whatsapp_number(raw: &str) -> Result<String, AppError> {
    let e164 = validate_br_phone(raw)?;
    Ok(e164.chars().filter(|c| c.is_ascii_digit()).collect())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(true)
}

fn fill(target: &mut Option<String>, candidate: &Option<String>) -> bool {
    if is_blank(target) && !is_blank(candidate) {
        *target = candidate.as_ref().map(|v| v.trim().to_string());
        true
    } else {
        false
    }
}

fn fill_copy<T: Copy>(target: &mut Option<T>, candidate: Option<T>) -> bool {
    if target.is_none() && candidate.is_some() {
        *target = candidate;
        true
    } else {
        false
    }
}

/// Merges `enrichment` onto `lead` without touching populated fields.
///
/// Moves a `descoberto` lead to `enriquecido`; any other status is left alone.
/// Returns how many fields were filled.
pub fn merge_enrichment(lead: &mut Lead, enrichment: &LeadEnrichment) -> usize {
    let filled = [
        fill(&mut lead.registry_number, &enrichment.registry_number),
        fill(&mut lead.specialty, &enrichment.specialty),
        fill(&mut lead.city, &enrichment.city),
        fill(&mut lead.phone, &enrichment.phone),
        fill(&mut lead.email, &enrichment.email),
        fill(&mut lead.instagram_handle, &enrichment.instagram_handle),
        fill_copy(&mut lead.instagram_followers, enrichment.instagram_followers),
        fill(&mut lead.linkedin_url, &enrichment.linkedin_url),
        fill(&mut lead.website, &enrichment.website),
        fill_copy(&mut lead.has_own_office, enrichment.has_own_office),
    ]
    .iter()
    .filter(|f| **f)
    .count();

    if lead.status == LeadStatus::Descoberto {
        lead.status = LeadStatus::Enriquecido;
    }
    filled
}

/// Drops contact values that fail validation; phones are normalized to E.164.
pub fn sanitize_enrichment(mut enrichment: LeadEnrichment) -> LeadEnrichment {
    enrichment.phone = enrichment
        .phone
        .as_deref()
        .and_then(|p| validate_br_phone(p).ok());
    enrichment.email = enrichment
        .email
        .filter(|e| is_valid_email(e.trim()))
        .map(|e| e.trim().to_lowercase());
    enrichment
}

/// A source of extra attributes for an existing lead.
#[async_trait]
pub trait EnrichmentChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Channels may skip leads they have nothing to offer for.
    fn applies_to(&self, _lead: &Lead) -> bool {
        true
    }

    /// Looks the lead up by `name`. An empty enrichment means nothing was found.
    async fn lookup(&self, lead: &Lead, name: &str) -> Result<LeadEnrichment, AppError>;
}

/// Instagram or LinkedIn profile lookup through the social search service.
///
/// Answers are cached for an hour, keyed by platform, name and city.
pub struct SocialProfileChannel {
    client: SocialSearchClient,
    platform: SocialPlatform,
    name: String,
    cache: Cache<String, String>,
}

impl SocialProfileChannel {
    pub fn new(client: SocialSearchClient, platform: SocialPlatform) -> Self {
        Self {
            client,
            platform,
            name: format!("{}_profile", platform),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(3600))
                .max_capacity(10_000)
                .build(),
        }
    }

    fn to_enrichment(&self, profile: &SocialProfile) -> LeadEnrichment {
        let mut enrichment = LeadEnrichment {
            city: profile.city.clone(),
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            website: profile.website.clone(),
            has_own_office: profile.mentions_own_office().then_some(true),
            ..Default::default()
        };

        match self.platform {
            SocialPlatform::Instagram => {
                enrichment.instagram_handle = profile
                    .username
                    .as_ref()
                    .map(|u| format!("@{}", u.trim_start_matches('@')));
                enrichment.instagram_followers = profile.followers;
            }
            SocialPlatform::Linkedin => {
                enrichment.linkedin_url = profile.profile_url.clone();
            }
        }
        enrichment
    }
}

#[async_trait]
impl EnrichmentChannel for SocialProfileChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, lead: &Lead) -> bool {
        match self.platform {
            SocialPlatform::Instagram => is_blank(&lead.instagram_handle),
            SocialPlatform::Linkedin => is_blank(&lead.linkedin_url),
        }
    }

    async fn lookup(&self, lead: &Lead, name: &str) -> Result<LeadEnrichment, AppError> {
        let city = lead.city.as_deref();
        let cache_key = format!(
            "{}:{}:{}",
            self.platform,
            name.trim().to_lowercase(),
            city.unwrap_or("").to_lowercase()
        );

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Some(profile) =
                ValidatedCacheEntry::unwrap_validated::<Option<SocialProfile>>(&cached)
            {
                tracing::debug!("Profile cache HIT (validated) for {}", cache_key);
                return Ok(profile
                    .map(|p| self.to_enrichment(&p))
                    .unwrap_or_default());
            }
            tracing::warn!("Cache validation failed for {}, refetching", cache_key);
        }

        let profile = self.client.lookup_profile(self.platform, name, city).await?;

        if let Some(entry) = ValidatedCacheEntry::wrap(&profile) {
            self.cache.insert(cache_key, entry).await;
        }

        Ok(profile
            .map(|p| self.to_enrichment(&p))
            .unwrap_or_default())
    }
}

/// Result of enriching one lead.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentOutcome {
    pub lead: Lead,
    pub channels_succeeded: Vec<String>,
    pub channels_failed: Vec<String>,
    pub fields_filled: usize,
}

impl EnrichmentOutcome {
    pub fn enriched(&self) -> bool {
        !self.channels_succeeded.is_empty()
    }
}

/// Runs every applicable channel for a lead and persists what they found.
///
/// Channel failures are absorbed. A store failure aborts the lead, since later
/// steps would read stale data.
pub async fn enrich_lead(
    store: &dyn LeadStore,
    channels: &[Arc<dyn EnrichmentChannel>],
    lead_id: Uuid,
    name: Option<&str>,
) -> Result<EnrichmentOutcome, AppError> {
    let mut lead = store
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

    let lookup_name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .unwrap_or_else(|| lead.full_name.clone());

    let mut outcome = EnrichmentOutcome {
        lead: lead.clone(),
        channels_succeeded: Vec::new(),
        channels_failed: Vec::new(),
        fields_filled: 0,
    };

    for channel in channels {
        if !channel.applies_to(&lead) {
            tracing::debug!("Channel {} skipped for lead {}", channel.name(), lead.id);
            continue;
        }

        match channel.lookup(&lead, &lookup_name).await {
            Ok(found) => {
                let found = sanitize_enrichment(found);
                let before = lead.clone();
                let filled = merge_enrichment(&mut lead, &found);

                if filled > 0 || before.status != lead.status {
                    lead = store.apply_enrichment(lead.id, &found).await?;
                }

                tracing::info!(
                    "✓ Channel {} filled {} field(s) on lead {}",
                    channel.name(),
                    filled,
                    lead.id
                );
                outcome.fields_filled += filled;
                outcome.channels_succeeded.push(channel.name().to_string());
            }
            Err(e) => {
                tracing::warn!(
                    "Channel {} failed for lead {}: {}",
                    channel.name(),
                    lead.id,
                    e
                );
                outcome.channels_failed.push(channel.name().to_string());
            }
        }
    }

    outcome.lead = lead;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewLead, SourceKind};

    fn discovered() -> Lead {
        NewLead {
            campaign_id: Uuid::new_v4(),
            full_name: "Marina Alves".to_string(),
            region: "MG".to_string(),
            email: Some("marina@clinica.com.br".to_string()),
            ..Default::default()
        }
        .into_lead(SourceKind::Instagram)
    }

    #[test]
    fn merge_fills_only_empty_fields() {
        let mut lead = discovered();
        let filled = merge_enrichment(
            &mut lead,
            &LeadEnrichment {
                email: Some("other@example.com".to_string()),
                phone: Some("+5531987654321".to_string()),
                instagram_followers: Some(3000),
                ..Default::default()
            },
        );

        assert_eq!(filled, 2);
        assert_eq!(lead.email.as_deref(), Some("marina@clinica.com.br"));
        assert_eq!(lead.phone.as_deref(), Some("+5531987654321"));
        assert_eq!(lead.instagram_followers, Some(3000));
        assert_eq!(lead.status, LeadStatus::Enriquecido);
    }

    #[test]
    fn merge_never_clears_or_downgrades() {
        let mut lead = discovered();
        lead.status = LeadStatus::Quente;
        lead.website = Some("https://marina.med.br".to_string());

        let filled = merge_enrichment(&mut lead, &LeadEnrichment::default());

        assert_eq!(filled, 0);
        assert_eq!(lead.website.as_deref(), Some("https://marina.med.br"));
        assert_eq!(lead.status, LeadStatus::Quente);
    }

    #[test]
    fn blank_existing_values_count_as_empty() {
        let mut lead = discovered();
        lead.city = Some("  ".to_string());
        merge_enrichment(
            &mut lead,
            &LeadEnrichment {
                city: Some(" Belo Horizonte ".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(lead.city.as_deref(), Some("Belo Horizonte"));
    }

    #[test]
    fn sanitize_drops_invalid_contacts() {
        let cleaned = sanitize_enrichment(LeadEnrichment {
            phone: Some("123".to_string()),
            email: Some("1199999999333@gmail.com".to_string()),
            ..Default::default()
        });
        assert_eq!(cleaned.phone, None);
        assert_eq!(cleaned.email, None);

        let cleaned = sanitize_enrichment(LeadEnrichment {
            phone: Some("(11) 98765-4321".to_string()),
            email: Some(" Dra.Ana@Clinica.com.br ".to_string()),
            ..Default::default()
        });
        assert_eq!(cleaned.phone.as_deref(), Some("+5511987654321"));
        assert_eq!(cleaned.email.as_deref(), Some("dra.ana@clinica.com.br"));
    }

    #[test]
    fn whatsapp_numbers_are_digits_with_country_code() {
        assert_eq!(
            normalize_whatsapp_number("(11) 98765-4321").unwrap(),
            "5511987654321"
        );
        assert_eq!(
            normalize_whatsapp_number("+55 21 98765-4321").unwrap(),
            "5521987654321"
        );
        assert!(normalize_whatsapp_number("12345").is_err());
    }
}
