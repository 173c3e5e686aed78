//! Rebuild Scheduler Background Job
//!
//! Periodically re-extracts purchases and rebuilds the recommender. A
//! failed cycle is logged and the previous model keeps serving until the
//! next attempt.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::RebuildReport;
use crate::services::RecommendationService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Default rebuild period (once a day)
const REBUILD_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RebuildSchedulerConfig {
    pub interval: Duration,
    /// Build immediately instead of waiting one interval first
    pub run_on_startup: bool,
}

impl Default for RebuildSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: REBUILD_INTERVAL,
            run_on_startup: true,
        }
    }
}

impl From<&Config> for RebuildSchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.rebuild_interval(),
            run_on_startup: config.rebuild_on_startup,
        }
    }
}

/// Start the rebuild loop. Never returns; spawn it.
pub async fn start_rebuild_scheduler(
    service: Arc<RecommendationService>,
    config: RebuildSchedulerConfig,
) {
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        run_on_startup = config.run_on_startup,
        "Starting recommender rebuild job"
    );

    if !config.run_on_startup {
        sleep(config.interval).await;
    }

    loop {
        let _ = run_rebuild_cycle(&service).await;
        sleep(config.interval).await;
    }
}

/// Run one rebuild and log its outcome.
pub async fn run_rebuild_cycle(service: &RecommendationService) -> Result<RebuildReport> {
    let result = service.rebuild().await;

    match &result {
        Ok(report) => {
            tracing::info!(
                purchases = report.purchases,
                users = report.users,
                items = report.items,
                duration_ms = report.duration.as_millis() as u64,
                "Recommendations built"
            );
        }
        Err(AppError::RebuildInProgress) => {
            tracing::debug!("Rebuild already running, skipping cycle");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Recommendation rebuild cycle failed");
        }
    }

    result
}
