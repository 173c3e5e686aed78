//! Recommendation pipeline
//!
//! Rebuild cycle:
//!   PurchaseSource → InteractionExtractor (+ IdMigrator) → InteractionWriter
//!   → data file → ModelBuilder → RecommenderModel (swapped in atomically)

pub mod data_writer;
pub mod extractor;
pub mod id_migrator;
pub mod recommendation;
pub mod recommender;

pub use data_writer::{FileInteractionWriter, InteractionWriter};
pub use extractor::{ExtractionStats, InteractionExtractor};
pub use id_migrator::IdMigrator;
pub use recommendation::RecommendationService;
pub use recommender::{ModelBuilder, RecommenderModel};
