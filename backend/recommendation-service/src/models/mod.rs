use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

/// Dense numeric user identifier assigned by the id migrator
pub type UserId = u64;

/// Catalog product identifier
pub type ItemId = i64;

/// One raw purchase row as supplied by the purchase source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub user_key: String,
    pub item_id: ItemId,
}

impl PurchaseRecord {
    pub fn new(user_key: impl Into<String>, item_id: ItemId) -> Self {
        Self {
            user_key: user_key.into(),
            item_id,
        }
    }
}

/// Normalized (user, item) implicit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
}

/// Ranked recommendation: item plus relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    pub item_id: ItemId,
    pub score: f64,
}

impl RecommendedItem {
    /// Descending score, then ascending item id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.item_id.cmp(&other.item_id))
    }
}

/// Catalog product resolved from an item id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
}

/// Lifecycle of the recommendation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Building,
    Ready,
    Rebuilding,
}

impl ServiceState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Building => "building",
            Self::Ready => "ready",
            Self::Rebuilding => "rebuilding",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one successful rebuild cycle
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub purchases: usize,
    pub users: usize,
    pub items: usize,
    pub neighbour_pairs: usize,
    pub duration: Duration,
    pub built_at: DateTime<Utc>,
}

/// Metadata of the currently active model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub users: usize,
    pub items: usize,
    pub interactions: usize,
    pub threshold: f64,
    pub built_at: DateTime<Utc>,
}
