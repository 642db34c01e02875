use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::db_storage::PgLeadStore;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        // Fail at startup rather than on the first campaign run
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Lead store sharing this pool.
    pub fn lead_store(&self) -> PgLeadStore {
        PgLeadStore::new(self.pool.clone())
    }
}
