pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

// Re-export common types
pub use config::{Config, RecommenderConfig};
pub use error::{AppError, Result};
pub use models::{
    ItemId, ModelInfo, Product, PurchaseRecord, RebuildReport, RecommendedItem, ServiceState,
    UserId,
};
pub use services::{IdMigrator, RecommendationService};
