use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{NewLead, SourceKind};
use crate::services::{
    CfmRegistryClient, RegistryPhysician, SocialPlatform, SocialProfile, SocialSearchClient,
};

/// Profiles requested from the social search per query.
const SOCIAL_SEARCH_LIMIT: usize = 50;

/// One discovery invocation: what to look for, where, and for which campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    /// Profession or specialty; `None` means the source's fallback.
    pub specialty: Option<String>,
    /// State (UF).
    pub region: String,
    pub city: Option<String>,
    pub campaign_id: Uuid,
}

/// A place new leads come from.
///
/// Implementations only fetch and normalize; persistence is the caller's job.
#[async_trait]
pub trait LeadSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Specialty searched when the query carries none.
    fn default_specialty(&self) -> &str;

    async fn fetch(&self, query: &DiscoveryQuery) -> Result<Vec<NewLead>, AppError>;
}

// ============ Registry ============

/// Physicians with an active registration in the medical council registry.
pub struct CfmRegistrySource {
    client: CfmRegistryClient,
}

impl CfmRegistrySource {
    pub fn new(client: CfmRegistryClient) -> Self {
        Self { client }
    }

    fn normalize(physician: RegistryPhysician, query: &DiscoveryQuery) -> NewLead {
        let specialty = physician
            .especialidades
            .first()
            .cloned()
            .or_else(|| query.specialty.clone());
        let has_office = physician
            .endereco_consultorio
            .as_deref()
            .map(|a| !a.trim().is_empty());

        NewLead {
            campaign_id: query.campaign_id,
            full_name: physician.nome.trim().to_string(),
            registry_number: Some(format!(
                "CRM/{} {}",
                physician.uf.trim().to_uppercase(),
                physician.crm.trim()
            )),
            profession: Some("medico".to_string()),
            specialty,
            region: query.region.clone(),
            city: physician.municipio.or_else(|| query.city.clone()),
            phone: physician.telefone,
            email: physician.email,
            has_own_office: has_office,
            ..Default::default()
        }
    }
}

#[async_trait]
impl LeadSource for CfmRegistrySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cfm
    }

    fn default_specialty(&self) -> &str {
        "Clínica Médica"
    }

    async fn fetch(&self, query: &DiscoveryQuery) -> Result<Vec<NewLead>, AppError> {
        let physicians = self
            .client
            .search_physicians(&query.region, query.city.as_deref(), query.specialty.as_deref())
            .await?;

        let total = physicians.len();
        let leads: Vec<NewLead> = physicians
            .into_iter()
            .filter(RegistryPhysician::is_active)
            .map(|p| Self::normalize(p, query))
            .collect();

        if leads.len() < total {
            tracing::debug!(
                "CFM registry: skipped {} inactive registration(s) in {}",
                total - leads.len(),
                query.region
            );
        }
        Ok(leads)
    }
}

// ============ Social profiles ============

/// Instagram or LinkedIn profiles found through the social search service.
pub struct SocialProfileSource {
    client: SocialSearchClient,
    platform: SocialPlatform,
}

impl SocialProfileSource {
    pub fn new(client: SocialSearchClient, platform: SocialPlatform) -> Self {
        Self { client, platform }
    }

    fn normalize(&self, profile: SocialProfile, query: &DiscoveryQuery) -> Option<NewLead> {
        let full_name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())?
            .to_string();

        let mut lead = NewLead {
            campaign_id: query.campaign_id,
            full_name,
            specialty: query.specialty.clone(),
            region: query.region.clone(),
            city: profile.city.clone().or_else(|| query.city.clone()),
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            website: profile.website.clone(),
            has_own_office: profile.mentions_own_office().then_some(true),
            ..Default::default()
        };

        match self.platform {
            SocialPlatform::Instagram => {
                lead.instagram_handle = profile
                    .username
                    .as_ref()
                    .map(|u| format!("@{}", u.trim_start_matches('@')));
                lead.instagram_followers = profile.followers;
            }
            SocialPlatform::Linkedin => {
                lead.linkedin_url = profile.profile_url.clone();
            }
        }
        Some(lead)
    }
}

#[async_trait]
impl LeadSource for SocialProfileSource {
    fn kind(&self) -> SourceKind {
        match self.platform {
            SocialPlatform::Instagram => SourceKind::Instagram,
            SocialPlatform::Linkedin => SourceKind::Linkedin,
        }
    }

    fn default_specialty(&self) -> &str {
        match self.platform {
            SocialPlatform::Instagram => "Dermatologia",
            SocialPlatform::Linkedin => "Médico",
        }
    }

    async fn fetch(&self, query: &DiscoveryQuery) -> Result<Vec<NewLead>, AppError> {
        let search = query
            .specialty
            .as_deref()
            .unwrap_or_else(|| self.default_specialty());
        let location = match &query.city {
            Some(city) => format!("{}, {}", city, query.region),
            None => query.region.clone(),
        };

        let profiles = self
            .client
            .search_profiles(self.platform, search, &location, SOCIAL_SEARCH_LIMIT)
            .await?;

        Ok(profiles
            .into_iter()
            .filter_map(|p| self.normalize(p, query))
            .collect())
    }
}

// ============ Mock ============

const MOCK_FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Elisa", "Fábio", "Gabriela", "Henrique",
];
const MOCK_LAST_NAMES: &[&str] = &["Silva", "Souza", "Oliveira", "Santos", "Lima", "Costa"];

/// Deterministic synthetic leads for tests and dry runs.
///
/// The same query always yields the same leads, so assertions can rely on them.
pub struct MockLeadSource {
    per_query: usize,
}

impl MockLeadSource {
    pub fn new(per_query: usize) -> Self {
        Self { per_query }
    }
}

#[async_trait]
impl LeadSource for MockLeadSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mock
    }

    fn default_specialty(&self) -> &str {
        "Dermatologia"
    }

    async fn fetch(&self, query: &DiscoveryQuery) -> Result<Vec<NewLead>, AppError> {
        let specialty = query
            .specialty
            .clone()
            .unwrap_or_else(|| self.default_specialty().to_string());
        let uf = query.region.to_uppercase();

        Ok((0..self.per_query)
            .map(|i| {
                let first = MOCK_FIRST_NAMES[i % MOCK_FIRST_NAMES.len()];
                let last = MOCK_LAST_NAMES[i % MOCK_LAST_NAMES.len()];
                let handle = format!("{}.{}{}", first, last, i + 1).to_lowercase();

                NewLead {
                    campaign_id: query.campaign_id,
                    full_name: format!("{} {}", first, last),
                    registry_number: (i % 2 == 0).then(|| format!("CRM/{} {}", uf, 100_000 + i)),
                    profession: Some("medico".to_string()),
                    specialty: Some(specialty.clone()),
                    region: uf.clone(),
                    city: query.city.clone(),
                    email: (i % 3 != 2).then(|| format!("contato{}@exemplo.com.br", i + 1)),
                    instagram_handle: Some(format!("@{}", handle)),
                    instagram_followers: Some(500 * (i as i64 + 1)),
                    has_own_office: Some(i % 2 == 0),
                    ..Default::default()
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(specialty: Option<&str>) -> DiscoveryQuery {
        DiscoveryQuery {
            specialty: specialty.map(String::from),
            region: "sp".to_string(),
            city: Some("São Paulo".to_string()),
            campaign_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn mock_source_is_deterministic() {
        let source = MockLeadSource::new(4);
        let q = query(Some("Cardiologia"));

        let first = source.fetch(&q).await.unwrap();
        let second = source.fetch(&q).await.unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert!(first.iter().all(|l| l.campaign_id == q.campaign_id));
        assert!(first.iter().all(|l| l.region == "SP"));
        assert_eq!(first[0].specialty.as_deref(), Some("Cardiologia"));
    }

    #[tokio::test]
    async fn mock_source_applies_fallback_specialty() {
        let leads = MockLeadSource::new(1).fetch(&query(None)).await.unwrap();
        assert_eq!(leads[0].specialty.as_deref(), Some("Dermatologia"));
    }

    #[test]
    fn registry_records_are_normalized() {
        let q = query(Some("Pediatria"));
        let lead = CfmRegistrySource::normalize(
            RegistryPhysician {
                nome: " Paula Reis ".to_string(),
                crm: "123456".to_string(),
                uf: "sp".to_string(),
                especialidades: vec![],
                municipio: None,
                situacao: Some("Ativo".to_string()),
                telefone: Some("11987654321".to_string()),
                email: None,
                endereco_consultorio: Some("Rua Augusta, 100".to_string()),
            },
            &q,
        );

        assert_eq!(lead.full_name, "Paula Reis");
        assert_eq!(lead.registry_number.as_deref(), Some("CRM/SP 123456"));
        assert_eq!(lead.specialty.as_deref(), Some("Pediatria"));
        assert_eq!(lead.city.as_deref(), Some("São Paulo"));
        assert_eq!(lead.has_own_office, Some(true));
    }
}
