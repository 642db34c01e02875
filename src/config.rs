use crate::errors::AppError;

/// Capitals and large metro areas that earn the "major city" scoring bonus.
pub const DEFAULT_MAJOR_CITIES: &[&str] = &[
    "São Paulo",
    "Rio de Janeiro",
    "Belo Horizonte",
    "Brasília",
    "Curitiba",
    "Porto Alegre",
    "Salvador",
    "Recife",
    "Fortaleza",
    "Campinas",
];

/// Credentials for a single upstream HTTP service.
#[derive(Debug, Clone)]
pub struct UpstreamCredentials {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// CFM registry lookup (registry discovery source).
    pub cfm_registry: Option<UpstreamCredentials>,
    /// Instagram/LinkedIn search service (social discovery and enrichment).
    pub social_search: Option<UpstreamCredentials>,
    /// WhatsApp automation gateway.
    pub whatsapp_gateway: Option<UpstreamCredentials>,
    pub payment_webhook_secret: Option<String>,
    pub major_cities: Vec<String>,
    pub follower_threshold: i64,
    pub use_mock_sources: bool,
    pub mock_leads_per_query: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests feed a map instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DB_URL")
            .or_else(|| get("DATABASE_URL"))
            .ok_or_else(|| {
                AppError::Configuration(
                    "DB_URL or DATABASE_URL environment variable required".to_string(),
                )
            })?;
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(AppError::Configuration(
                "DB_URL must start with postgresql:// or postgres://".to_string(),
            ));
        }

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Configuration("PORT must be a valid number between 1-65535".to_string())
            })?,
            None => 3000,
        };

        let config = Self {
            database_url,
            port,
            cfm_registry: upstream_group(&get, "CFM_REGISTRY_BASE_URL", "CFM_REGISTRY_API_KEY")?,
            social_search: upstream_group(&get, "SOCIAL_SEARCH_BASE_URL", "SOCIAL_SEARCH_TOKEN")?,
            whatsapp_gateway: upstream_group(
                &get,
                "WHATSAPP_GATEWAY_URL",
                "WHATSAPP_GATEWAY_TOKEN",
            )?,
            payment_webhook_secret: get("PAYMENT_WEBHOOK_SECRET"),
            major_cities: get("SCORING_MAJOR_CITIES")
                .map(|raw| {
                    raw.split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| DEFAULT_MAJOR_CITIES.iter().map(|c| c.to_string()).collect()),
            follower_threshold: match get("SCORING_FOLLOWER_THRESHOLD") {
                Some(raw) => raw.parse().map_err(|_| {
                    AppError::Configuration(
                        "SCORING_FOLLOWER_THRESHOLD must be an integer".to_string(),
                    )
                })?,
                None => 1000,
            },
            use_mock_sources: get("USE_MOCK_SOURCES")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            mock_leads_per_query: match get("MOCK_LEADS_PER_QUERY") {
                Some(raw) => raw.parse().map_err(|_| {
                    AppError::Configuration("MOCK_LEADS_PER_QUERY must be an integer".to_string())
                })?,
                None => 5,
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        if let Some(ref registry) = config.cfm_registry {
            tracing::debug!("CFM registry URL: {}", registry.base_url);
        }
        if let Some(ref social) = config.social_search {
            tracing::debug!("Social search URL: {}", social.base_url);
        }
        if let Some(ref gateway) = config.whatsapp_gateway {
            tracing::info!("WhatsApp gateway configured: {}", gateway.base_url);
        }
        if config.payment_webhook_secret.is_none() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET not set - payment webhooks are unauthenticated");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Registry credentials, or a configuration error naming the missing keys.
    pub fn require_cfm_registry(&self) -> Result<&UpstreamCredentials, AppError> {
        self.cfm_registry.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "CFM_REGISTRY_BASE_URL and CFM_REGISTRY_API_KEY are required".to_string(),
            )
        })
    }

    pub fn require_social_search(&self) -> Result<&UpstreamCredentials, AppError> {
        self.social_search.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "SOCIAL_SEARCH_BASE_URL and SOCIAL_SEARCH_TOKEN are required".to_string(),
            )
        })
    }

    pub fn require_whatsapp_gateway(&self) -> Result<&UpstreamCredentials, AppError> {
        self.whatsapp_gateway.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "WHATSAPP_GATEWAY_URL and WHATSAPP_GATEWAY_TOKEN are required".to_string(),
            )
        })
    }
}

/// First characters of a URL for logs; never splits a multi-byte character.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

/// Reads an optional (base URL, token) pair.
///
/// Both keys absent means the upstream is not configured. Only one of them set is an error.
fn upstream_group<F>(
    get: &F,
    url_key: &str,
    token_key: &str,
) -> Result<Option<UpstreamCredentials>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match (get(url_key), get(token_key)) {
        (None, None) => Ok(None),
        (Some(base_url), Some(token)) => {
            let parsed = url::Url::parse(&base_url).map_err(|e| {
                AppError::Configuration(format!("{} is not a valid URL: {}", url_key, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(AppError::Configuration(format!(
                    "{} must start with http:// or https://",
                    url_key
                )));
            }
            Ok(Some(UpstreamCredentials {
                base_url: base_url.trim_end_matches('/').to_string(),
                token,
            }))
        }
        (Some(_), None) => Err(AppError::Configuration(format!(
            "{} is set but {} is missing",
            url_key, token_key
        ))),
        (None, Some(_)) => Err(AppError::Configuration(format!(
            "{} is set but {} is missing",
            token_key, url_key
        ))),
    }
}
