use std::env;
use uuid::Uuid;

use rust_campaign_api::db::Database;
use rust_campaign_api::models::{CampaignStatus, LeadStatus, NewLead, SourceKind};
use rust_campaign_api::scoring::{score_lead, ScoringRules};
use rust_campaign_api::store::{LeadEnrichment, LeadStore, PaymentEventRecord};

/// Smoke test for the Postgres lead store: campaign status, bulk insert, enrichment, scoring
/// and webhook deduplication.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn pg_lead_store_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = db.lead_store();

    let campaign_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO campaigns (id, name, professions, specialties, regions, sources, active, status, total_leads)
        VALUES ($1, 'Smoke test', ARRAY['medico'], ARRAY['Dermatologia'], ARRAY['SP'], ARRAY['mock'], TRUE, 'pendente', 0)
        "#,
    )
    .bind(campaign_id)
    .execute(&db.pool)
    .await?;

    store
        .update_campaign_status(campaign_id, CampaignStatus::EmExecucao, None)
        .await?;
    let campaign = store
        .get_campaign(campaign_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("campaign not readable after insert"))?;
    assert_eq!(campaign.status, CampaignStatus::EmExecucao);
    assert_eq!(campaign.sources, vec![SourceKind::Mock]);

    let stored = store
        .insert_leads(
            SourceKind::Mock,
            vec![NewLead {
                campaign_id,
                full_name: "Smoke Lead".to_string(),
                region: "SP".to_string(),
                email: Some("smoke@clinica.com.br".to_string()),
                ..Default::default()
            }],
        )
        .await?;
    assert_eq!(stored.len(), 1);
    let lead = &stored[0];
    assert_eq!(lead.status, LeadStatus::Descoberto);

    // Existing email must survive; empty columns get filled
    let enriched = store
        .apply_enrichment(
            lead.id,
            &LeadEnrichment {
                email: Some("other@example.com".to_string()),
                city: Some("São Paulo".to_string()),
                has_own_office: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(enriched.email.as_deref(), Some("smoke@clinica.com.br"));
    assert_eq!(enriched.city.as_deref(), Some("São Paulo"));
    assert_eq!(enriched.status, LeadStatus::Enriquecido);

    let outcome = score_lead(&enriched, &ScoringRules::default());
    store.save_score(lead.id, &outcome).await?;
    let scored = store
        .get_lead(lead.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("lead disappeared"))?;
    assert_eq!(scored.score, outcome.score);
    assert_eq!(scored.status, outcome.status);
    assert_eq!(store.count_leads(campaign_id).await?, 1);

    let event = PaymentEventRecord {
        provider: "stripe".to_string(),
        event_id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: Some("invoice.paid".to_string()),
        payload: serde_json::json!({"id": "evt", "type": "invoice.paid"}),
    };
    assert!(store.record_payment_event(&event).await?);
    assert!(!store.record_payment_event(&event).await?);

    Ok(())
}
