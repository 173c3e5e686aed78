use crate::models::UserId;
use std::cmp::Ordering;

/// Neighbour of a user with its similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
}

/// Keeps every candidate whose similarity reaches a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdNeighborhood {
    threshold: f64,
}

impl ThresholdNeighborhood {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn accepts(&self, similarity: f64) -> bool {
        !similarity.is_nan() && similarity >= self.threshold
    }

    /// Filter `candidates` into the neighbourhood of `user_id`, ordered by
    /// descending similarity then ascending user id.
    pub fn select(
        &self,
        user_id: UserId,
        candidates: impl IntoIterator<Item = Neighbor>,
    ) -> Vec<Neighbor> {
        let mut neighbors: Vec<Neighbor> = candidates
            .into_iter()
            .filter(|n| n.user_id != user_id && self.accepts(n.similarity))
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors
    }
}

pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}
