/// Integration tests with mocked external APIs
/// Exercises the registry, social search and WhatsApp adapters without hitting real services
use rust_campaign_api::config::Config;
use rust_campaign_api::enrichment::{EnrichmentChannel, SocialProfileChannel};
use rust_campaign_api::errors::AppError;
use rust_campaign_api::gateway_client::{MessageGateway, WhatsAppGatewayClient};
use rust_campaign_api::models::{NewLead, SourceKind};
use rust_campaign_api::services::{CfmRegistryClient, SocialPlatform, SocialSearchClient};
use rust_campaign_api::sources::{CfmRegistrySource, DiscoveryQuery, LeadSource, SocialProfileSource};
use std::collections::HashMap;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(base_url: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("DATABASE_URL", "postgresql://test".to_string()),
        ("CFM_REGISTRY_BASE_URL", base_url.to_string()),
        ("CFM_REGISTRY_API_KEY", "registry_key".to_string()),
        ("SOCIAL_SEARCH_BASE_URL", base_url.to_string()),
        ("SOCIAL_SEARCH_TOKEN", "social_token".to_string()),
        ("WHATSAPP_GATEWAY_URL", base_url.to_string()),
        ("WHATSAPP_GATEWAY_TOKEN", "gateway_token".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn query(region: &str, specialty: Option<&str>) -> DiscoveryQuery {
    DiscoveryQuery {
        specialty: specialty.map(String::from),
        region: region.to_string(),
        city: None,
        campaign_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_registry_source_normalizes_active_physicians() {
    let mock_server = MockServer::start().await;

    let mock_response = serde_json::json!({
        "items": [
            {
                "nome": "Fernanda Rocha",
                "crm": "54321",
                "uf": "SP",
                "especialidades": ["Dermatologia"],
                "municipio": "São Paulo",
                "situacao": "Ativo",
                "telefone": "11987654321",
                "endereco_consultorio": "Av. Paulista, 1000"
            },
            {
                "nome": "Registro Cancelado",
                "crm": "11111",
                "uf": "SP",
                "situacao": "Cancelado"
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/v1/medicos"))
        .and(query_param("uf", "SP"))
        .and(query_param("especialidade", "Dermatologia"))
        .and(header("X-API-Key", "registry_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mock_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let source = CfmRegistrySource::new(CfmRegistryClient::from_config(&config).unwrap());

    let q = query("SP", Some("Dermatologia"));
    let leads = source.fetch(&q).await.unwrap();

    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.full_name, "Fernanda Rocha");
    assert_eq!(lead.registry_number.as_deref(), Some("CRM/SP 54321"));
    assert_eq!(lead.specialty.as_deref(), Some("Dermatologia"));
    assert_eq!(lead.city.as_deref(), Some("São Paulo"));
    assert_eq!(lead.has_own_office, Some(true));
    assert_eq!(lead.campaign_id, q.campaign_id);
}

#[tokio::test]
async fn test_registry_outage_is_upstream_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/medicos"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = CfmRegistryClient::new(mock_server.uri(), "registry_key").unwrap();
    let err = CfmRegistrySource::new(client)
        .fetch(&query("RJ", None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn test_instagram_source_maps_profiles() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/instagram/search"))
        .and(query_param("q", "Dermatologia"))
        .and(query_param("location", "MG"))
        .and(header("Authorization", "Bearer social_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "profiles": [
                {
                    "name": "Dra. Luiza Prado",
                    "username": "draluizaprado",
                    "followers": 15400,
                    "website": "https://luizaprado.com.br",
                    "bio": "Dermatologista | Clínica em BH"
                },
                {"username": "sem_nome"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = SocialSearchClient::new(mock_server.uri(), "social_token").unwrap();
    let source = SocialProfileSource::new(client, SocialPlatform::Instagram);

    // No specialty: the Instagram fallback is searched
    let leads = source.fetch(&query("MG", None)).await.unwrap();

    assert_eq!(source.kind(), SourceKind::Instagram);
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].instagram_handle.as_deref(), Some("@draluizaprado"));
    assert_eq!(leads[0].instagram_followers, Some(15400));
    assert_eq!(leads[0].has_own_office, Some(true));
    assert_eq!(leads[0].region, "MG");
}

#[tokio::test]
async fn test_profile_channel_caches_lookups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/linkedin/profiles/lookup"))
        .and(query_param("name", "Marcos Teles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "profile": {
                "name": "Marcos Teles",
                "profile_url": "https://linkedin.com/in/marcosteles",
                "email": "marcos@telesortopedia.com.br",
                "phone": "(31) 99876-5432"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SocialSearchClient::new(mock_server.uri(), "social_token").unwrap();
    let channel = SocialProfileChannel::new(client, SocialPlatform::Linkedin);
    let lead = NewLead {
        campaign_id: Uuid::new_v4(),
        full_name: "Marcos Teles".to_string(),
        region: "MG".to_string(),
        ..Default::default()
    }
    .into_lead(SourceKind::Cfm);

    assert!(channel.applies_to(&lead));
    let first = channel.lookup(&lead, "Marcos Teles").await.unwrap();
    let second = channel.lookup(&lead, "marcos teles").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.linkedin_url.as_deref(),
        Some("https://linkedin.com/in/marcosteles")
    );
    assert_eq!(first.email.as_deref(), Some("marcos@telesortopedia.com.br"));
}

#[tokio::test]
async fn test_profile_lookup_not_found_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/instagram/profiles/lookup"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = SocialSearchClient::new(mock_server.uri(), "social_token").unwrap();
    let profile = client
        .lookup_profile(SocialPlatform::Instagram, "Ninguém", None)
        .await
        .unwrap();
    assert!(profile.is_none());
}

#[tokio::test]
async fn test_whatsapp_gateway_send() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("Authorization", "Bearer gateway_token"))
        .and(body_json(serde_json::json!({
            "phone": "5511987654321",
            "body": "Olá Ana"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "key": {"id": "3EB0C767D26A"},
            "status": "PENDING"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let gateway = WhatsAppGatewayClient::from_config(&config).unwrap();

    let ack = gateway.send_text("5511987654321", "Olá Ana").await.unwrap();

    assert_eq!(ack.message_id.as_deref(), Some("3EB0C767D26A"));
    assert_eq!(ack.status.as_deref(), Some("PENDING"));
}

#[tokio::test]
async fn test_whatsapp_gateway_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("number not on WhatsApp"))
        .mount(&mock_server)
        .await;

    let gateway = WhatsAppGatewayClient::new(mock_server.uri(), "gateway_token").unwrap();
    let err = gateway.send_text("5511987654321", "Olá").await.unwrap_err();

    assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    assert!(err.to_string().contains("number not on WhatsApp"));
}
