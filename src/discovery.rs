use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{DiscoveryRequest, Lead};
use crate::sources::{DiscoveryQuery, LeadSource};
use crate::store::LeadStore;

impl DiscoveryRequest {
    /// Validates the request and turns it into a source query.
    pub fn into_query(self) -> Result<DiscoveryQuery, AppError> {
        build_query(self.specialty, self.region, self.city, self.campaign_id)
    }
}

/// Region is required; blank optional fields collapse to `None`.
pub fn build_query(
    specialty: Option<String>,
    region: Option<String>,
    city: Option<String>,
    campaign_id: Uuid,
) -> Result<DiscoveryQuery, AppError> {
    let clean = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let region = clean(region)
        .ok_or_else(|| AppError::InvalidInput("Region (estado) is required".to_string()))?
        .to_uppercase();

    Ok(DiscoveryQuery {
        specialty: clean(specialty),
        region,
        city: clean(city),
        campaign_id,
    })
}

/// Runs one source for one query and persists what it found.
///
/// Returned leads are the stored records: status `descoberto`, baseline score.
pub async fn discover(
    store: &dyn LeadStore,
    source: &dyn LeadSource,
    mut query: DiscoveryQuery,
) -> Result<Vec<Lead>, AppError> {
    if query.region.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Region (estado) is required".to_string(),
        ));
    }
    if query.specialty.is_none() {
        query.specialty = Some(source.default_specialty().to_string());
    }

    tracing::info!(
        "🔎 Discovery: source={} region={} city={:?} specialty={:?}",
        source.kind(),
        query.region,
        query.city,
        query.specialty
    );

    let found = source.fetch(&query).await?;
    if found.is_empty() {
        tracing::info!("No leads from {} in {}", source.kind(), query.region);
        return Ok(Vec::new());
    }

    let stored = store.insert_leads(source.kind(), found).await?;
    tracing::info!(
        "✓ {} lead(s) discovered by {} in {}",
        stored.len(),
        source.kind(),
        query.region
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryLeadStore;
    use crate::models::{LeadStatus, BASELINE_DISCOVERY_SCORE};
    use crate::sources::MockLeadSource;

    #[test]
    fn region_is_required() {
        let err = build_query(Some("Pediatria".into()), Some("  ".into()), None, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let query = build_query(None, Some(" rj ".into()), Some("".into()), Uuid::new_v4()).unwrap();
        assert_eq!(query.region, "RJ");
        assert_eq!(query.city, None);
        assert_eq!(query.specialty, None);
    }

    #[tokio::test]
    async fn discovered_leads_are_persisted_with_baseline() {
        let store = MemoryLeadStore::new();
        let campaign_id = Uuid::new_v4();
        let query = build_query(None, Some("MG".into()), None, campaign_id).unwrap();

        let leads = discover(&store, &MockLeadSource::new(3), query).await.unwrap();

        assert_eq!(leads.len(), 3);
        assert!(leads
            .iter()
            .all(|l| l.status == LeadStatus::Descoberto && l.score == BASELINE_DISCOVERY_SCORE));
        assert_eq!(store.count_leads(campaign_id).await.unwrap(), 3);
        assert_eq!(leads[0].specialty.as_deref(), Some("Dermatologia"));
    }
}
