//! Shared request and result types for the scoring sources.

use crate::error::{RecommendError, Result};
use data_loader::{ItemId, RatingRange};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

// =============================================================================
// Candidates
// =============================================================================

/// Which scorer produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CandidateSource {
    /// Content-based: popularity and genre statistics
    Popularity,
    /// Neighbor-weighted predicted rating
    Collaborative,
}

/// Extra signals carried alongside a candidate's score
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateMetadata {
    /// Rating events behind a popularity candidate
    pub num_ratings: Option<u32>,
    /// Blended popularity ranking score the list was sorted by
    pub ranking_score: Option<f64>,
    /// How many selected neighbors rated a collaborative candidate
    pub neighbor_support: Option<u32>,
}

/// A scored item, before it is joined back to catalog metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub item_id: ItemId,
    pub source: CandidateSource,
    /// Average rating (popularity) or predicted rating (collaborative)
    pub score: f32,
    pub metadata: CandidateMetadata,
}

impl Candidate {
    pub fn new(item_id: ItemId, source: CandidateSource, score: f32) -> Self {
        Self {
            item_id,
            source,
            score,
            metadata: CandidateMetadata::default(),
        }
    }
}

// =============================================================================
// User rating query
// =============================================================================

/// Caller-supplied sparse ratings, `item id -> rating`.
///
/// Inserting the same item twice keeps the last value. Owned by a single
/// request and dropped once it has been scored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRatingQuery {
    ratings: BTreeMap<ItemId, f32>,
}

impl UserRatingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous rating for the item, if any
    pub fn insert(&mut self, item_id: ItemId, rating: f32) -> Option<f32> {
        self.ratings.insert(item_id, rating)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.ratings.contains_key(&item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<f32> {
        self.ratings.get(&item_id).copied()
    }

    /// Pairs in ascending item id order
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f32)> + '_ {
        self.ratings.iter().map(|(&item_id, &rating)| (item_id, rating))
    }

    /// Reject the first rating outside `range`
    pub fn validate(&self, range: RatingRange) -> Result<()> {
        match self.iter().find(|&(_, rating)| !range.contains(rating)) {
            Some((item_id, rating)) => Err(RecommendError::RatingOutOfRange {
                item_id,
                rating,
                min: range.min,
                max: range.max,
            }),
            None => Ok(()),
        }
    }
}

impl FromIterator<(ItemId, f32)> for UserRatingQuery {
    fn from_iter<T: IntoIterator<Item = (ItemId, f32)>>(iter: T) -> Self {
        Self {
            ratings: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Budget
// =============================================================================

/// Wall-clock allowance for one request.
///
/// Long scans call [`Budget::check`] between blocks of vector work, so an
/// exhausted budget aborts the request at a block boundary.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    /// Starts counting now
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Fails once the elapsed time reaches the limit; a zero limit is
    /// exhausted from the start
    pub fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) => {
                let elapsed = self.started.elapsed();
                if elapsed >= limit {
                    Err(RecommendError::BudgetExceeded {
                        budget: limit,
                        elapsed,
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_creation() {
        let candidate = Candidate::new(1, CandidateSource::Collaborative, 4.25);
        assert_eq!(candidate.item_id, 1);
        assert_eq!(candidate.source, CandidateSource::Collaborative);
        assert_eq!(candidate.score, 4.25);
        assert_eq!(candidate.metadata, CandidateMetadata::default());
    }

    #[test]
    fn test_query_last_write_wins() {
        let mut query = UserRatingQuery::new();
        assert_eq!(query.insert(10, 3.0), None);
        assert_eq!(query.insert(10, 4.5), Some(3.0));
        assert_eq!(query.len(), 1);
        assert_eq!(query.get(10), Some(4.5));

        let query: UserRatingQuery = vec![(1, 2.0), (1, 5.0)].into_iter().collect();
        assert_eq!(query.get(1), Some(5.0));
    }

    #[test]
    fn test_query_validation() {
        let range = RatingRange::default();

        let ok: UserRatingQuery = vec![(1, 0.5), (2, 5.0)].into_iter().collect();
        assert!(ok.validate(range).is_ok());

        let bad: UserRatingQuery = vec![(1, 4.0), (2, 7.5)].into_iter().collect();
        match bad.validate(range) {
            Err(RecommendError::RatingOutOfRange { item_id, .. }) => assert_eq!(item_id, 2),
            other => panic!("unexpected: {:?}", other),
        }

        let nan: UserRatingQuery = vec![(3, f32::NAN)].into_iter().collect();
        assert!(nan.validate(range).is_err());
    }

    #[test]
    fn test_budget() {
        assert!(Budget::unlimited().check().is_ok());
        assert!(Budget::new(Duration::from_secs(60)).check().is_ok());

        let exhausted = Budget::new(Duration::ZERO);
        assert!(matches!(
            exhausted.check(),
            Err(RecommendError::BudgetExceeded { .. })
        ));
    }
}
