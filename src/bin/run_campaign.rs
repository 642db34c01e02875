//! Runs the campaign pipeline once and prints the run report as JSON.
//!
//! Usage: `run_campaign <campaign-uuid>` (reads the same environment as the server).

use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use rust_campaign_api::config::Config;
use rust_campaign_api::db::Database;
use rust_campaign_api::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_campaign_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let campaign_id: Uuid = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: run_campaign <campaign-uuid>"))?
        .parse()?;

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let state = AppState::from_config(config, Arc::new(db.lead_store()))?;

    let report = state.orchestrator.run(campaign_id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
