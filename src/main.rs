use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_campaign_api::config::Config;
use rust_campaign_api::db::Database;
use rust_campaign_api::handlers::{self, AppState};
use rust_campaign_api::webhook_handler;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - Discovery sources, enrichment channels and the messaging gateway.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_campaign_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Build application state (adapters are registered per configured credential group)
    let app_state = Arc::new(AppState::from_config(
        config.clone(),
        Arc::new(db.lead_store()),
    )?);

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // Campaign pipeline
        .route("/api/v1/campaigns/:id/run", post(handlers::run_campaign))
        .route(
            "/api/v1/campaigns/:id/leads",
            get(handlers::list_campaign_leads),
        )
        .route("/api/v1/discovery/:source", post(handlers::discover_leads))
        // Single-lead steps
        .route(
            "/api/v1/leads/:id/enrich",
            post(handlers::enrich_single_lead),
        )
        .route("/api/v1/leads/:id/score", post(handlers::score_single_lead))
        .route(
            "/api/v1/leads/:id/messages",
            post(handlers::send_lead_message),
        )
        .route("/api/v1/roi", post(handlers::calculate_roi))
        // Payment provider webhooks
        .route(
            "/api/v1/webhooks/payments/:provider",
            post(webhook_handler::payment_webhook),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
