//! Collaborative Source - neighbor-weighted rating prediction
//!
//! "Users whose ratings look like yours rated these items highly."
//!
//! ## Algorithm
//! 1. Align the caller's ratings to the matrix columns (unknown items are
//!    ignored)
//! 2. Find the `neighbor_count` most similar users by cosine similarity
//! 3. For each item, predicted = sum(sim_i * rating_i) / sum(sim_i) over
//!    the selected neighbors, unrated cells counting as 0
//! 4. Drop items the caller already rated
//! 5. Sort by prediction, descending; equal predictions keep column order
//!
//! If the selected similarities sum to zero there is nothing to weight by,
//! and the result is empty.

use crate::error::Result;
use crate::matrix::{InteractionMatrix, UNRATED};
use crate::similarity::{Neighbor, NeighborSearch};
use crate::types::{Budget, Candidate, CandidateSource, UserRatingQuery};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_NEIGHBOR_COUNT: usize = 20;

/// Predicted rating for one matrix column
#[derive(Debug, Clone, Copy, PartialEq)]
struct Prediction {
    column: usize,
    rating: f32,
    support: u32,
}

/// Collaborative source generates personalized candidates from similar users
#[derive(Debug, Clone)]
pub struct CollaborativeScorer {
    /// Shared reference to the interaction matrix (read-only, no locking)
    matrix: Arc<InteractionMatrix>,
    search: NeighborSearch,
    default_neighbor_count: usize,
}

impl CollaborativeScorer {
    pub fn new(matrix: Arc<InteractionMatrix>) -> Self {
        Self {
            search: NeighborSearch::new(matrix.clone()),
            matrix,
            default_neighbor_count: DEFAULT_NEIGHBOR_COUNT,
        }
    }

    /// Configure the neighbor count used when the caller does not pick one (default: 20)
    pub fn with_default_neighbor_count(mut self, neighbor_count: usize) -> Self {
        self.default_neighbor_count = neighbor_count;
        self
    }

    /// Configure rows per similarity scan block
    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.search = self.search.with_block_rows(block_rows);
        self
    }

    pub fn default_neighbor_count(&self) -> usize {
        self.default_neighbor_count
    }

    pub fn matrix(&self) -> &Arc<InteractionMatrix> {
        &self.matrix
    }

    /// Predicted-rating ranking for items the caller has not rated.
    ///
    /// Each candidate's score is its predicted rating.
    #[instrument(skip(self, user_ratings, budget), fields(ratings = user_ratings.len()))]
    pub fn score_from_ratings(
        &self,
        user_ratings: &UserRatingQuery,
        limit: usize,
        neighbor_count: usize,
        budget: &Budget,
    ) -> Result<Vec<Candidate>> {
        let query = self.matrix.query_vector(user_ratings);
        debug!(
            "Query matched {} of {} rated items",
            query.matched(),
            user_ratings.len()
        );

        let neighbors = self.search.find_neighbors(&query, neighbor_count, budget)?;
        budget.check()?;

        let predictions = match self.predict(&neighbors) {
            Some(predictions) => predictions,
            None => {
                debug!("Neighbor similarities sum to zero, no prediction possible");
                return Ok(Vec::new());
            }
        };

        let mut candidates: Vec<Candidate> = predictions
            .into_iter()
            .filter_map(|prediction| {
                let item_id = self.matrix.item_ids()[prediction.column];
                if user_ratings.contains(item_id) {
                    return None;
                }
                let mut candidate =
                    Candidate::new(item_id, CandidateSource::Collaborative, prediction.rating);
                candidate.metadata.neighbor_support = Some(prediction.support);
                Some(candidate)
            })
            .collect();

        // Stable: equal predictions stay in column order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);

        debug!("Generated {} collaborative candidates", candidates.len());
        Ok(candidates)
    }

    /// Weighted average rating per column across the neighbors.
    ///
    /// `None` when the similarity weights sum to zero. Every column gets a
    /// prediction; one no neighbor rated comes out at 0 with no support.
    fn predict(&self, neighbors: &[Neighbor]) -> Option<Vec<Prediction>> {
        let weight_sum: f64 = neighbors.iter().map(|n| n.similarity as f64).sum();
        if weight_sum.abs() <= f64::EPSILON {
            return None;
        }

        let width = self.matrix.num_columns();
        let mut weighted = vec![0.0f64; width];
        let mut support = vec![0u32; width];
        for neighbor in neighbors {
            let weight = neighbor.similarity as f64;
            for (col, &rating) in self.matrix.row(neighbor.row).iter().enumerate() {
                if rating != UNRATED {
                    weighted[col] += weight * rating as f64;
                    support[col] += 1;
                }
            }
        }

        let predictions = weighted
            .into_iter()
            .zip(support)
            .enumerate()
            .map(|(column, (sum, support))| Prediction {
                column,
                rating: (sum / weight_sum) as f32,
                support,
            })
            .collect();
        Some(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use data_loader::{ItemId, RatingEvent};

    /// Users 1-3 like the sci-fi block (10, 11, 12), users 4-5 like the
    /// romance block (20, 21, 22).
    fn create_test_matrix() -> Arc<InteractionMatrix> {
        let mut ratings = Vec::new();
        for user in 1..=3 {
            ratings.push(RatingEvent::new(user, 10, 5.0));
            ratings.push(RatingEvent::new(user, 11, 4.5));
            ratings.push(RatingEvent::new(user, 20, 1.0));
        }
        ratings.push(RatingEvent::new(1, 12, 5.0));
        ratings.push(RatingEvent::new(2, 12, 4.0));
        for user in 4..=5 {
            ratings.push(RatingEvent::new(user, 20, 5.0));
            ratings.push(RatingEvent::new(user, 21, 4.5));
            ratings.push(RatingEvent::new(user, 22, 4.0));
            ratings.push(RatingEvent::new(user, 10, 1.0));
        }
        Arc::new(InteractionMatrix::from_ratings(&ratings).unwrap())
    }

    fn query(pairs: &[(ItemId, f32)]) -> UserRatingQuery {
        pairs.iter().copied().collect()
    }

    fn ids(candidates: &[Candidate]) -> Vec<ItemId> {
        candidates.iter().map(|c| c.item_id).collect()
    }

    #[test]
    fn test_never_recommends_rated_items() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let user = query(&[(10, 5.0), (11, 4.0)]);

        let candidates = scorer
            .score_from_ratings(&user, 10, 5, &Budget::unlimited())
            .unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| !user.contains(c.item_id)));
        assert!(candidates.iter().all(|c| c.source == CandidateSource::Collaborative));
    }

    #[test]
    fn test_similar_users_drive_the_ranking() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let user = query(&[(10, 5.0), (11, 5.0)]);

        let candidates = scorer
            .score_from_ratings(&user, 1, 3, &Budget::unlimited())
            .unwrap();
        // The three sci-fi fans are the neighbors; 12 is their unseen favourite
        assert_eq!(ids(&candidates), vec![12]);
    }

    #[test]
    fn test_weighted_average() {
        let matrix = create_test_matrix();
        let scorer = CollaborativeScorer::new(matrix.clone());
        let user = query(&[(10, 5.0), (11, 4.5), (20, 1.0)]);

        // Rows 0-2 (users 1-3) are the three nearest neighbors
        let q = matrix.query_vector(&user);
        let sims: Vec<f32> = (0..3)
            .map(|row| cosine_similarity(q.values(), matrix.row(row)))
            .collect();
        let expected = (sims[0] * 5.0 + sims[1] * 4.0) / (sims[0] + sims[1] + sims[2]);

        let candidates = scorer
            .score_from_ratings(&user, 10, 3, &Budget::unlimited())
            .unwrap();
        let item_12 = candidates.iter().find(|c| c.item_id == 12).unwrap();
        assert!((item_12.score - expected).abs() < 1e-4);
        assert_eq!(item_12.metadata.neighbor_support, Some(2));
        // Only the sci-fi fans were selected, so the romance block scores zero
        for item_id in [21, 22] {
            let candidate = candidates.iter().find(|c| c.item_id == item_id).unwrap();
            assert_eq!(candidate.score, 0.0);
            assert_eq!(candidate.metadata.neighbor_support, Some(0));
        }
    }

    #[test]
    fn test_columns_no_neighbor_rated_score_zero() {
        let ratings = vec![
            RatingEvent::new(1, 10, 5.0),
            RatingEvent::new(1, 11, 4.0),
            RatingEvent::new(2, 20, 3.0),
        ];
        let matrix = Arc::new(InteractionMatrix::from_ratings(&ratings).unwrap());
        let scorer = CollaborativeScorer::new(matrix);

        let candidates = scorer
            .score_from_ratings(&query(&[(10, 5.0)]), 10, 1, &Budget::unlimited())
            .unwrap();

        let scored: Vec<(ItemId, f32)> =
            candidates.iter().map(|c| (c.item_id, c.score)).collect();
        assert_eq!(scored, vec![(11, 4.0), (20, 0.0)]);
        assert_eq!(candidates[1].metadata.neighbor_support, Some(0));
    }

    #[test]
    fn test_sorted_descending_and_limited() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let user = query(&[(20, 5.0)]);

        let all = scorer
            .score_from_ratings(&user, 10, 5, &Budget::unlimited())
            .unwrap();
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));

        let limited = scorer
            .score_from_ratings(&user, 2, 5, &Budget::unlimited())
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(ids(&limited), ids(&all[..2]));

        assert!(scorer
            .score_from_ratings(&user, 0, 5, &Budget::unlimited())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_query_yields_empty_result() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let candidates = scorer
            .score_from_ratings(&UserRatingQuery::new(), 10, 5, &Budget::unlimited())
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_unknown_items_only_yields_empty_result() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let candidates = scorer
            .score_from_ratings(&query(&[(999, 4.0)]), 10, 5, &Budget::unlimited())
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_predictions_are_finite() {
        let scorer = CollaborativeScorer::new(create_test_matrix());
        let candidates = scorer
            .score_from_ratings(&query(&[(22, 0.5)]), 10, 20, &Budget::unlimited())
            .unwrap();
        assert!(candidates.iter().all(|c| c.score.is_finite()));
    }
}
