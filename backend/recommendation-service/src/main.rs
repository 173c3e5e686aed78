use anyhow::{bail, Context, Result};
use recommendation_service::config::Config;
use recommendation_service::db::{PgProductCatalog, PgPurchaseSource};
use recommendation_service::jobs::{start_rebuild_scheduler, RebuildSchedulerConfig};
use recommendation_service::services::RecommendationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing (LOG_FORMAT=json for structured output)
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!(
        "Starting recommendation-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    config
        .validate()
        .context("Configuration validation failed")?;
    if config.database_url.is_empty() {
        bail!("database_url is required");
    }
    info!(
        data_file = %config.data_file_path.display(),
        id_migrator_file = %config.id_migrator_file_path.display(),
        threshold = config.recommender.threshold,
        count = config.recommender.count,
        "Configuration loaded and validated"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to create PostgreSQL pool")?;
    info!("PostgreSQL connection pool created");

    let service = Arc::new(
        RecommendationService::from_config(
            &config,
            Arc::new(PgPurchaseSource::new(pg_pool.clone())),
            Arc::new(PgProductCatalog::new(pg_pool.clone())),
        )
        .context("Failed to initialize recommendation service")?,
    );
    info!(
        known_users = service.migrator().len(),
        id_store = %service.migrator().store_path().display(),
        "Recommendation service initialized"
    );

    let scheduler = tokio::spawn(start_rebuild_scheduler(
        service.clone(),
        RebuildSchedulerConfig::from(&config),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    scheduler.abort();
    if let Err(e) = service.migrator().flush() {
        warn!(error = %e, "Failed to flush id migrator on shutdown");
    }
    pg_pool.close().await;

    info!("recommendation-service stopped");
    Ok(())
}
