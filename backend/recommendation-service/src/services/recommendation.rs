//! Recommendation service: owns the active model, runs rebuild cycles and
//! answers top-N queries.
//!
//! Readers take a snapshot `Arc` of the active model under a short read
//! lock and never wait for a rebuild; a rebuild publishes its model with a
//! single pointer swap after it fully succeeds.

use crate::config::{Config, RecommenderConfig};
use crate::db::{ProductCatalog, PurchaseSource};
use crate::error::{AppError, Result};
use crate::models::{ModelInfo, Product, RebuildReport, RecommendedItem, ServiceState};
use crate::services::data_writer::{FileInteractionWriter, InteractionWriter};
use crate::services::extractor::InteractionExtractor;
use crate::services::id_migrator::IdMigrator;
use crate::services::recommender::{ModelBuilder, RecommenderModel};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub struct RecommendationService {
    config: RecommenderConfig,
    data_file_path: PathBuf,
    migrator: Arc<IdMigrator>,
    extractor: InteractionExtractor,
    source: Arc<dyn PurchaseSource>,
    catalog: Arc<dyn ProductCatalog>,
    /// Held for the whole rebuild; doubles as the rebuild exclusion lock
    writer: Mutex<Box<dyn InteractionWriter>>,
    active: RwLock<Option<Arc<RecommenderModel>>>,
    rebuilding: AtomicBool,
}

impl RecommendationService {
    pub fn new(
        config: RecommenderConfig,
        data_file_path: impl Into<PathBuf>,
        migrator: Arc<IdMigrator>,
        source: Arc<dyn PurchaseSource>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let data_file_path = data_file_path.into();
        let writer: Box<dyn InteractionWriter> =
            Box::new(FileInteractionWriter::new(data_file_path.clone()));

        Self {
            config,
            data_file_path,
            extractor: InteractionExtractor::new(migrator.clone()),
            migrator,
            source,
            catalog,
            writer: Mutex::new(writer),
            active: RwLock::new(None),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Open the id migrator store and wire the service from configuration.
    pub fn from_config(
        config: &Config,
        source: Arc<dyn PurchaseSource>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Result<Self> {
        config
            .recommender
            .validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let migrator = Arc::new(IdMigrator::open(&config.id_migrator_file_path)?);

        Ok(Self::new(
            config.recommender,
            &config.data_file_path,
            migrator,
            source,
            catalog,
        ))
    }

    pub fn migrator(&self) -> &Arc<IdMigrator> {
        &self.migrator
    }

    pub fn default_count(&self) -> usize {
        self.config.count
    }

    pub async fn state(&self) -> ServiceState {
        let has_model = self.active.read().await.is_some();
        match (has_model, self.rebuilding.load(Ordering::SeqCst)) {
            (false, false) => ServiceState::Uninitialized,
            (false, true) => ServiceState::Building,
            (true, false) => ServiceState::Ready,
            (true, true) => ServiceState::Rebuilding,
        }
    }

    /// Snapshot of the active model.
    pub async fn active_model(&self) -> Result<Arc<RecommenderModel>> {
        self.active.read().await.clone().ok_or(AppError::NotReady)
    }

    pub async fn model_info(&self) -> Option<ModelInfo> {
        self.active.read().await.as_ref().map(|model| model.info())
    }

    /// Extract purchases, write the dataset, build a new model and swap it
    /// in. On failure the previous model keeps serving.
    ///
    /// A call made while another rebuild runs fails with
    /// [`AppError::RebuildInProgress`].
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let mut writer = self
            .writer
            .try_lock()
            .map_err(|_| AppError::RebuildInProgress)?;
        let _flag = RebuildFlag::raise(&self.rebuilding);

        let started = Instant::now();
        info!(
            data_file = %self.data_file_path.display(),
            "Creating data file with current purchases"
        );

        match self.run_rebuild(&mut **writer).await {
            Ok((model, purchases)) => {
                let info = model.info();
                let report = RebuildReport {
                    purchases,
                    users: info.users,
                    items: info.items,
                    neighbour_pairs: model.neighbour_pairs(),
                    duration: started.elapsed(),
                    built_at: Utc::now(),
                };

                *self.active.write().await = Some(Arc::new(model));

                info!(
                    purchases = report.purchases,
                    users = report.users,
                    items = report.items,
                    neighbour_pairs = report.neighbour_pairs,
                    duration_ms = report.duration.as_millis() as u64,
                    "Recommender rebuilt and activated"
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    error = %err,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Recommender rebuild failed, keeping previous model"
                );
                Err(err)
            }
        }
    }

    async fn run_rebuild(
        &self,
        writer: &mut dyn InteractionWriter,
    ) -> Result<(RecommenderModel, usize)> {
        let stats = self.extractor.extract(self.source.as_ref(), writer).await?;

        info!("Initializing the recommender with data");
        let builder = ModelBuilder::new(self.config.threshold);
        let path = self.data_file_path.clone();
        let model = tokio::task::spawn_blocking(move || builder.build_from_file(&path))
            .await
            .map_err(|e| AppError::ModelBuild(format!("model build task panicked: {e}")))??;

        Ok((model, stats.purchases))
    }

    /// Top-N items for a user key. `None` uses the configured count.
    pub async fn recommend(
        &self,
        user_key: &str,
        count: Option<usize>,
    ) -> Result<Vec<RecommendedItem>> {
        let model = self.active_model().await?;
        let user_id = self.migrator.to_id(user_key)?;
        let count = count.unwrap_or(self.config.count);

        match model.recommend(user_id, count) {
            Ok(items) => Ok(items),
            Err(AppError::NoSuchUser(_)) => {
                // Known key without purchases in the current dataset.
                debug!(user_id, "User has no interactions in the active model");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Top-N products for a user key. Ids the catalog no longer knows are
    /// skipped.
    pub async fn recommend_items(
        &self,
        user_key: &str,
        count: Option<usize>,
    ) -> Result<Vec<Product>> {
        let recommended = self.recommend(user_key, count).await?;
        let mut products = Vec::with_capacity(recommended.len());

        for item in recommended {
            match self.catalog.find_by_id(item.item_id).await? {
                Some(product) => {
                    debug!(
                        product_id = product.id,
                        name = %product.name,
                        score = item.score,
                        "Product recommended"
                    );
                    products.push(product);
                }
                None => {
                    warn!(
                        item_id = item.item_id,
                        "Recommended item missing from catalog, skipping"
                    );
                }
            }
        }

        Ok(products)
    }
}

/// Marks a rebuild as running until dropped.
struct RebuildFlag<'a>(&'a AtomicBool);

impl<'a> RebuildFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RebuildFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
