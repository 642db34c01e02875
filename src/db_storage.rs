use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{
    Campaign, CampaignRow, CampaignStatus, Lead, LeadRow, LeadStatus, MessageLog, NewLead,
    SourceExecution, SourceKind,
};
use crate::scoring::ScoreOutcome;
use crate::store::{LeadEnrichment, LeadStore, PaymentEventRecord};

const LEAD_COLUMNS: &str = "id, campaign_id, full_name, registry_number, profession, specialty, \
     region, city, phone, email, instagram_handle, instagram_followers, linkedin_url, website, \
     has_own_office, source, status, score, justification, created_at, updated_at";

/// Rows per INSERT statement; keeps bulk inserts well under the Postgres bind limit.
const INSERT_CHUNK: usize = 500;

/// Postgres-backed lead store.
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT id, name, professions, specialties, regions, city, sources, active,
                   status, total_leads, message_template, created_at, updated_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading campaign {}", id))?;

        row.map(Campaign::try_from).transpose()
    }

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
        total_leads: Option<i64>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2,
                total_leads = COALESCE($3, total_leads),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(total_leads)
        .execute(&self.pool)
        .await
        .with_context(|| format!("updating campaign {} to {}", id, status))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Campaign {} not found", id)));
        }
        Ok(())
    }

    async fn insert_leads(
        &self,
        source: SourceKind,
        leads: Vec<NewLead>,
    ) -> Result<Vec<Lead>, AppError> {
        if leads.is_empty() {
            return Ok(Vec::new());
        }

        let leads: Vec<Lead> = leads.into_iter().map(|l| l.into_lead(source)).collect();
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(leads.len());

        for chunk in leads.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO leads ({}) ", LEAD_COLUMNS));
            builder.push_values(chunk, |mut b, lead| {
                b.push_bind(lead.id)
                    .push_bind(lead.campaign_id)
                    .push_bind(lead.full_name.clone())
                    .push_bind(lead.registry_number.clone())
                    .push_bind(lead.profession.clone())
                    .push_bind(lead.specialty.clone())
                    .push_bind(lead.region.clone())
                    .push_bind(lead.city.clone())
                    .push_bind(lead.phone.clone())
                    .push_bind(lead.email.clone())
                    .push_bind(lead.instagram_handle.clone())
                    .push_bind(lead.instagram_followers)
                    .push_bind(lead.linkedin_url.clone())
                    .push_bind(lead.website.clone())
                    .push_bind(lead.has_own_office)
                    .push_bind(lead.source.as_str())
                    .push_bind(lead.status.as_str())
                    .push_bind(lead.score)
                    .push_bind(lead.justification.clone())
                    .push_bind(lead.created_at)
                    .push_bind(lead.updated_at);
            });
            builder.push(format!(" RETURNING {}", LEAD_COLUMNS));

            let rows = builder
                .build_query_as::<LeadRow>()
                .fetch_all(&mut *tx)
                .await
                .with_context(|| format!("inserting {} {} leads", chunk.len(), source))?;

            for row in rows {
                stored.push(Lead::try_from(row)?);
            }
        }

        tx.commit().await?;
        tracing::info!("✓ Stored {} lead(s) from {}", stored.len(), source);
        Ok(stored)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads WHERE id = $1",
            LEAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lead::try_from).transpose()
    }

    async fn list_leads(
        &self,
        campaign_id: Uuid,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {} FROM leads
             WHERE campaign_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at ASC, id ASC",
            LEAD_COLUMNS
        ))
        .bind(campaign_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("listing leads of campaign {}", campaign_id))?;

        rows.into_iter().map(Lead::try_from).collect()
    }

    async fn count_leads(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leads WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn apply_enrichment(
        &self,
        lead_id: Uuid,
        enrichment: &LeadEnrichment,
    ) -> Result<Lead, AppError> {
        // COALESCE(NULLIF(col, ''), $n) keeps any value already stored
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            UPDATE leads SET
                registry_number = COALESCE(NULLIF(registry_number, ''), $2),
                specialty = COALESCE(NULLIF(specialty, ''), $3),
                city = COALESCE(NULLIF(city, ''), $4),
                phone = COALESCE(NULLIF(phone, ''), $5),
                email = COALESCE(NULLIF(email, ''), $6),
                instagram_handle = COALESCE(NULLIF(instagram_handle, ''), $7),
                instagram_followers = COALESCE(instagram_followers, $8),
                linkedin_url = COALESCE(NULLIF(linkedin_url, ''), $9),
                website = COALESCE(NULLIF(website, ''), $10),
                has_own_office = COALESCE(has_own_office, $11),
                status = CASE WHEN status = 'descoberto' THEN 'enriquecido' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LEAD_COLUMNS
        ))
        .bind(lead_id)
        .bind(non_blank(&enrichment.registry_number))
        .bind(non_blank(&enrichment.specialty))
        .bind(non_blank(&enrichment.city))
        .bind(non_blank(&enrichment.phone))
        .bind(non_blank(&enrichment.email))
        .bind(non_blank(&enrichment.instagram_handle))
        .bind(enrichment.instagram_followers)
        .bind(non_blank(&enrichment.linkedin_url))
        .bind(non_blank(&enrichment.website))
        .bind(enrichment.has_own_office)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("enriching lead {}", lead_id))?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

        Lead::try_from(row)
    }

    async fn save_score(&self, lead_id: Uuid, outcome: &ScoreOutcome) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET score = $2, status = $3, justification = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .bind(outcome.score)
        .bind(outcome.status.as_str())
        .bind(&outcome.justification)
        .execute(&self.pool)
        .await
        .with_context(|| format!("saving score of lead {}", lead_id))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", lead_id)));
        }
        Ok(())
    }

    async fn record_source_execution(&self, record: &SourceExecution) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO source_executions (id, campaign_id, source, leads_found, status, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.campaign_id)
        .bind(record.source.as_str())
        .bind(record.leads_found)
        .bind(record.status.as_str())
        .bind(record.executed_at)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "recording {} execution for campaign {}",
                record.source, record.campaign_id
            )
        })?;
        Ok(())
    }

    async fn log_message(&self, log: &MessageLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO message_logs (id, lead_id, phone, body, status, provider_message_id, error, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(log.lead_id)
        .bind(&log.phone)
        .bind(&log.body)
        .bind(log.status.as_str())
        .bind(&log.provider_message_id)
        .bind(&log.error)
        .bind(log.sent_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("logging message for lead {}", log.lead_id))?;
        Ok(())
    }

    async fn record_payment_event(&self, event: &PaymentEventRecord) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_webhook_events (provider, event_id, event_type, payload, received_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(&event.provider)
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .execute(&self.pool)
        .await
        .with_context(|| format!("recording {} event {}", event.provider, event.event_id))?;

        Ok(result.rows_affected() > 0)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
