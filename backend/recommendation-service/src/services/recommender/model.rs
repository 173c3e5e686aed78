use super::loader::{load_dataset, InteractionDataset};
use super::neighborhood::{sort_neighbors, Neighbor, ThresholdNeighborhood};
use super::similarity::log_likelihood_similarity;
use crate::error::{AppError, Result};
use crate::models::{ItemId, ModelInfo, RecommendedItem, UserId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Builds user-based recommenders from interaction data
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder {
    neighborhood: ThresholdNeighborhood,
}

impl ModelBuilder {
    pub fn new(threshold: f64) -> Self {
        Self {
            neighborhood: ThresholdNeighborhood::new(threshold),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.neighborhood.threshold()
    }

    /// Load the data file and build a model from it.
    pub fn build_from_file(&self, path: &Path) -> Result<RecommenderModel> {
        let dataset = load_dataset(path)?;
        self.build(dataset)
    }

    /// Compute pairwise similarities and neighbourhoods.
    ///
    /// Only users sharing at least one item are compared, using an
    /// item -> users inverted index.
    pub fn build(&self, dataset: InteractionDataset) -> Result<RecommenderModel> {
        let threshold = self.neighborhood.threshold();
        if !threshold.is_finite() {
            return Err(AppError::ModelBuild(format!(
                "invalid neighbourhood threshold {}",
                threshold
            )));
        }

        let started = Instant::now();
        let num_items = dataset.num_items();

        let mut item_users: HashMap<ItemId, Vec<UserId>> = HashMap::with_capacity(num_items);
        for (user_id, items) in dataset.users() {
            for item_id in items {
                item_users.entry(*item_id).or_default().push(user_id);
            }
        }

        let mut neighborhoods: HashMap<UserId, Vec<Neighbor>> = HashMap::new();
        let mut compared_pairs = 0usize;
        let mut neighbour_pairs = 0usize;
        let mut common: HashMap<UserId, usize> = HashMap::new();

        for (user_id, items) in dataset.users() {
            common.clear();
            for item_id in items {
                if let Some(users) = item_users.get(item_id) {
                    // Each pair is scored once, from its lower id.
                    for other in users.iter().filter(|other| **other > user_id) {
                        *common.entry(*other).or_insert(0) += 1;
                    }
                }
            }

            for (&other, &shared) in &common {
                let other_items = dataset.items_of(other).map(BTreeSet::len).unwrap_or(0);
                let Some(similarity) =
                    log_likelihood_similarity(items.len(), other_items, shared, num_items)
                else {
                    continue;
                };
                compared_pairs += 1;

                if self.neighborhood.accepts(similarity) {
                    neighbour_pairs += 1;
                    neighborhoods.entry(user_id).or_default().push(Neighbor {
                        user_id: other,
                        similarity,
                    });
                    neighborhoods.entry(other).or_default().push(Neighbor {
                        user_id,
                        similarity,
                    });
                }
            }
        }

        for neighbors in neighborhoods.values_mut() {
            sort_neighbors(neighbors);
        }

        info!(
            users = dataset.num_users(),
            items = num_items,
            interactions = dataset.num_interactions(),
            compared_pairs,
            neighbour_pairs,
            threshold,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recommender model built"
        );

        Ok(RecommenderModel {
            dataset,
            neighborhoods,
            neighbour_pairs,
            threshold,
            built_at: Utc::now(),
        })
    }
}

/// Immutable user-based recommender.
///
/// Scores a candidate item by the summed similarity of the neighbours that
/// have it; ties go to the lower item id.
#[derive(Debug)]
pub struct RecommenderModel {
    dataset: InteractionDataset,
    neighborhoods: HashMap<UserId, Vec<Neighbor>>,
    neighbour_pairs: usize,
    threshold: f64,
    built_at: DateTime<Utc>,
}

impl RecommenderModel {
    pub fn dataset(&self) -> &InteractionDataset {
        &self.dataset
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.dataset.contains_user(user_id)
    }

    pub fn neighbour_pairs(&self) -> usize {
        self.neighbour_pairs
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Similarity between two users of the dataset, `None` if either is
    /// unknown or they share no item.
    pub fn similarity(&self, a: UserId, b: UserId) -> Option<f64> {
        let items_a = self.dataset.items_of(a)?;
        let items_b = self.dataset.items_of(b)?;
        let shared = items_a.intersection(items_b).count();
        log_likelihood_similarity(items_a.len(), items_b.len(), shared, self.dataset.num_items())
    }

    pub fn neighborhood(&self, user_id: UserId) -> Result<&[Neighbor]> {
        if !self.dataset.contains_user(user_id) {
            return Err(AppError::NoSuchUser(user_id));
        }
        Ok(self
            .neighborhoods
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn recommend(&self, user_id: UserId, n: usize) -> Result<Vec<RecommendedItem>> {
        let owned = self
            .dataset
            .items_of(user_id)
            .ok_or(AppError::NoSuchUser(user_id))?;
        let neighbors = self.neighborhood(user_id)?;

        if n == 0 || neighbors.is_empty() {
            return Ok(Vec::new());
        }

        let mut scores: HashMap<ItemId, f64> = HashMap::new();
        for neighbor in neighbors {
            let Some(items) = self.dataset.items_of(neighbor.user_id) else {
                continue;
            };
            for item_id in items.difference(owned) {
                *scores.entry(*item_id).or_insert(0.0) += neighbor.similarity;
            }
        }

        let mut ranked: Vec<RecommendedItem> = scores
            .into_iter()
            .map(|(item_id, score)| RecommendedItem { item_id, score })
            .collect();
        ranked.sort_by(|a, b| a.rank_cmp(b));
        ranked.truncate(n);

        debug!(
            user_id,
            neighbors = neighbors.len(),
            returned = ranked.len(),
            "User-based recommendations generated"
        );

        Ok(ranked)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            users: self.dataset.num_users(),
            items: self.dataset.num_items(),
            interactions: self.dataset.num_interactions(),
            threshold: self.threshold,
            built_at: self.built_at,
        }
    }
}
