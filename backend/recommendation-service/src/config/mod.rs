use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "STOCK_RECOMMENDATION";
const CONFIG_FILE: &str = "config/stock-recommendation";

pub const DEFAULT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_COUNT: usize = 6;
pub const DEFAULT_LOG_FILTER: &str = "info,recommendation_service=debug";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Durable stores
    pub data_file_path: PathBuf,
    pub id_migrator_file_path: PathBuf,

    // Model tuning
    pub recommender: RecommenderConfig,

    // Purchase source and catalog (PostgreSQL)
    #[serde(default)]
    pub database_url: String,
    pub database_max_connections: u32,

    // Rebuild scheduling
    pub rebuild_interval_secs: u64,
    pub rebuild_on_startup: bool,

    // Observability (EnvFilter directives, overridden by RUST_LOG)
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecommenderConfig {
    /// Minimum similarity for a user to enter a neighbourhood
    pub threshold: f64,
    /// Default number of recommendations per query
    pub count: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            count: DEFAULT_COUNT,
        }
    }
}

impl RecommenderConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(anyhow!("recommender.threshold must be a finite number"));
        }

        if self.count == 0 {
            return Err(anyhow!("recommender.count must be greater than 0"));
        }

        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("data_file_path", "data/purchases.csv")?
            .set_default("id_migrator_file_path", "data/id_migrator.jsonl")?
            .set_default("recommender.threshold", DEFAULT_THRESHOLD)?
            .set_default("recommender.count", DEFAULT_COUNT as i64)?
            .set_default("database_max_connections", 5)?
            .set_default("rebuild_interval_secs", 86_400)? // once a day
            .set_default("rebuild_on_startup", true)?
            .set_default("log_level", DEFAULT_LOG_FILTER)?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Tracing filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &str {
        match self.log_level.trim() {
            "" => DEFAULT_LOG_FILTER,
            level => level,
        }
    }

    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_file_path.as_os_str().is_empty() {
            return Err(anyhow!("data_file_path is required"));
        }

        if self.id_migrator_file_path.as_os_str().is_empty() {
            return Err(anyhow!("id_migrator_file_path is required"));
        }

        if self.data_file_path == self.id_migrator_file_path {
            return Err(anyhow!(
                "data_file_path and id_migrator_file_path must be different files"
            ));
        }

        if self.rebuild_interval_secs == 0 {
            return Err(anyhow!("rebuild_interval_secs must be greater than 0"));
        }

        self.recommender.validate()
    }
}
