use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::circuit_breaker::{create_upstream_circuit_breaker, guarded, UpstreamBreaker};
use crate::config::Config;
use crate::errors::AppError;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

fn build_http_client(service: &str) -> Result<Client, AppError> {
    Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to create {} client: {}", service, e)))
}

/// Turns a non-2xx response into `UpstreamUnavailable`, keeping the body for the log.
async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!("{} returned error {}: {}", service, status, error_text);
    Err(AppError::UpstreamUnavailable(format!(
        "{} returned status {}: {}",
        service, status, error_text
    )))
}

// ============ CFM Registry ============

/// Physician record as returned by the registry search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryPhysician {
    pub nome: String,
    pub crm: String,
    pub uf: String,
    #[serde(default)]
    pub especialidades: Vec<String>,
    pub municipio: Option<String>,
    /// Registration state, e.g. "Ativo" or "Cancelado".
    pub situacao: Option<String>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    /// Declared office address, when the physician has one.
    pub endereco_consultorio: Option<String>,
}

impl RegistryPhysician {
    pub fn is_active(&self) -> bool {
        self.situacao
            .as_deref()
            .map(|s| s.trim().eq_ignore_ascii_case("ativo"))
            .unwrap_or(true)
    }
}

#[derive(Debug, Deserialize)]
struct RegistrySearchResponse {
    #[serde(default)]
    items: Vec<RegistryPhysician>,
}

/// Client for the medical council registry lookup service.
#[derive(Clone)]
pub struct CfmRegistryClient {
    client: Client,
    base_url: String,
    api_key: String,
    breaker: UpstreamBreaker,
}

impl CfmRegistryClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            client: build_http_client("CFM registry")?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            breaker: create_upstream_circuit_breaker(),
        })
    }

    /// Fails with a configuration error when the registry keys are absent.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let creds = config.require_cfm_registry()?;
        Self::new(creds.base_url.clone(), creds.token.clone())
    }

    /// Searches physicians registered in `uf`, optionally narrowed by city and specialty.
    pub async fn search_physicians(
        &self,
        uf: &str,
        city: Option<&str>,
        specialty: Option<&str>,
    ) -> Result<Vec<RegistryPhysician>, AppError> {
        let mut params = vec![("uf", uf)];
        if let Some(city) = city {
            params.push(("municipio", city));
        }
        if let Some(specialty) = specialty {
            params.push(("especialidade", specialty));
        }

        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(&format!("{}/v1/medicos", self.base_url), &params)
            .map_err(|e| AppError::InvalidInput(format!("Failed to build registry URL: {}", e)))?;

        tracing::info!(
            "CFM registry: searching uf={} city={:?} specialty={:?}",
            uf,
            city,
            specialty
        );

        let response = guarded(&self.breaker, "CFM registry", async {
            let response = self
                .client
                .get(url)
                .header("X-API-Key", &self.api_key)
                .send()
                .await
                .map_err(|e| {
                    AppError::UpstreamUnavailable(format!("CFM registry request failed: {}", e))
                })?;
            ensure_success("CFM registry", response).await
        })
        .await?;

        let result: RegistrySearchResponse = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse CFM registry response: {}", e))
        })?;

        tracing::info!("CFM registry: {} physician(s) found in {}", result.items.len(), uf);
        Ok(result.items)
    }
}

// ============ Social Profile Search ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Instagram,
    Linkedin,
}

impl SocialPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public profile returned by the social search service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub name: Option<String>,
    pub username: Option<String>,
    pub profile_url: Option<String>,
    pub followers: Option<i64>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
}

impl SocialProfile {
    /// Whether the bio advertises a private office or clinic.
    pub fn mentions_own_office(&self) -> bool {
        const MARKERS: &[&str] = &[
            "consultório",
            "consultorio",
            "clínica",
            "clinica",
            "atendimento particular",
        ];
        self.bio
            .as_deref()
            .map(|bio| {
                let bio = bio.to_lowercase();
                MARKERS.iter().any(|m| bio.contains(m))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileSearchResponse {
    #[serde(default)]
    profiles: Vec<SocialProfile>,
}

#[derive(Debug, Deserialize)]
struct ProfileLookupResponse {
    profile: Option<SocialProfile>,
}

/// Client for the Instagram/LinkedIn profile search service.
#[derive(Clone)]
pub struct SocialSearchClient {
    client: Client,
    base_url: String,
    token: String,
    breaker: UpstreamBreaker,
}

impl SocialSearchClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            client: build_http_client("social search")?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            breaker: create_upstream_circuit_breaker(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let creds = config.require_social_search()?;
        Self::new(creds.base_url.clone(), creds.token.clone())
    }

    /// Searches public profiles matching `query` around `location`.
    pub async fn search_profiles(
        &self,
        platform: SocialPlatform,
        query: &str,
        location: &str,
        limit: usize,
    ) -> Result<Vec<SocialProfile>, AppError> {
        let limit = limit.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/{}/search", self.base_url, platform),
            &[("q", query), ("location", location), ("limit", limit.as_str())],
        )
        .map_err(|e| AppError::InvalidInput(format!("Failed to build search URL: {}", e)))?;

        tracing::info!(
            "Social search: {} profiles for '{}' in {}",
            platform,
            query,
            location
        );

        let response = guarded(&self.breaker, "social search", async {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| {
                    AppError::UpstreamUnavailable(format!("Social search request failed: {}", e))
                })?;
            ensure_success("social search", response).await
        })
        .await?;

        let result: ProfileSearchResponse = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse social search response: {}", e))
        })?;

        tracing::info!("Social search: {} {} profile(s)", result.profiles.len(), platform);
        Ok(result.profiles)
    }

    /// Looks up the best-matching profile for a person. `Ok(None)` when nobody matches.
    pub async fn lookup_profile(
        &self,
        platform: SocialPlatform,
        name: &str,
        city: Option<&str>,
    ) -> Result<Option<SocialProfile>, AppError> {
        let mut params = vec![("name", name)];
        if let Some(city) = city {
            params.push(("city", city));
        }
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/{}/profiles/lookup", self.base_url, platform),
            &params,
        )
        .map_err(|e| AppError::InvalidInput(format!("Failed to build lookup URL: {}", e)))?;

        tracing::debug!("Social lookup: {} profile of '{}'", platform, name);

        let response = guarded(&self.breaker, "social search", async {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| {
                    AppError::UpstreamUnavailable(format!("Social lookup request failed: {}", e))
                })?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            ensure_success("social search", response).await.map(Some)
        })
        .await?;

        let Some(response) = response else {
            tracing::debug!("Social lookup: no {} profile for '{}'", platform, name);
            return Ok(None);
        };

        let result: ProfileLookupResponse = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse social lookup response: {}", e))
        })?;
        Ok(result.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_registrations_are_detected() {
        let mut physician = RegistryPhysician {
            nome: "Paula Reis".to_string(),
            crm: "123456".to_string(),
            uf: "SP".to_string(),
            especialidades: vec![],
            municipio: None,
            situacao: Some("Cancelado".to_string()),
            telefone: None,
            email: None,
            endereco_consultorio: None,
        };
        assert!(!physician.is_active());

        physician.situacao = Some(" ATIVO ".to_string());
        assert!(physician.is_active());

        physician.situacao = None;
        assert!(physician.is_active());
    }

    #[test]
    fn office_markers_in_bio() {
        let profile = SocialProfile {
            bio: Some("Dermatologista | Clínica Pele Viva em Moema".to_string()),
            ..Default::default()
        };
        assert!(profile.mentions_own_office());
        assert!(!SocialProfile::default().mentions_own_office());
    }

    #[test]
    fn clients_build_without_network() {
        assert!(CfmRegistryClient::new("https://registry.example.com/", "key").is_ok());
        assert!(SocialSearchClient::new("https://social.example.com", "token").is_ok());
    }
}
