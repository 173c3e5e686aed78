// ============================================
// User-based Collaborative Filtering
// ============================================
//
// Three stages, rebuilt from scratch on every refresh:
//   1. Similarity   - log-likelihood ratio over shared purchases
//   2. Neighborhood - users whose similarity reaches the threshold
//   3. Ranking      - candidate items scored by summed neighbour similarity
//
// Data Flow:
//   data file → loader → InteractionDataset → ModelBuilder → RecommenderModel

pub mod loader;
pub mod model;
pub mod neighborhood;
pub mod similarity;

pub use loader::{load_dataset, parse_dataset, InteractionDataset};
pub use model::{ModelBuilder, RecommenderModel};
pub use neighborhood::{Neighbor, ThresholdNeighborhood};
pub use similarity::{log_likelihood_ratio, log_likelihood_similarity};
