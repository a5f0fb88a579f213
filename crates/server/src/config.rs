//! Engine configuration.
//!
//! Every tunable of the recommendation engine in one place. Defaults match
//! the behaviour the engine was designed around; builders override them.

use data_loader::RatingRange;
use sources::RecommendError;
use sources::collaborative::DEFAULT_NEIGHBOR_COUNT;
use sources::matrix::UNRATED;
use sources::popularity::{
    DEFAULT_COUNT_WEIGHT, DEFAULT_MIN_SUPPORT, DEFAULT_QUALITY_SCALE, DEFAULT_QUALITY_WEIGHT,
};
use sources::similarity::DEFAULT_BLOCK_ROWS;

/// Below this many caller ratings the hybrid engine blends in popularity
pub const DEFAULT_SPARSE_HISTORY_THRESHOLD: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Minimum rating events for an item to be ranked by popularity
    pub min_support: u32,
    /// Weight of the raw rating count in the popularity score
    pub count_weight: f64,
    /// Weight of the scaled mean rating in the popularity score
    pub quality_weight: f64,
    /// Multiplier that lifts a mean rating to count magnitude
    pub quality_scale: f64,
    /// Neighbors consulted by collaborative scoring
    pub neighbor_count: usize,
    /// Caller histories shorter than this get the blended treatment
    pub sparse_history_threshold: usize,
    /// Valid rating values, for both the catalog and caller queries
    pub rating_range: RatingRange,
    /// Matrix rows per similarity scan block
    pub block_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            count_weight: DEFAULT_COUNT_WEIGHT,
            quality_weight: DEFAULT_QUALITY_WEIGHT,
            quality_scale: DEFAULT_QUALITY_SCALE,
            neighbor_count: DEFAULT_NEIGHBOR_COUNT,
            sparse_history_threshold: DEFAULT_SPARSE_HISTORY_THRESHOLD,
            rating_range: RatingRange::default(),
            block_rows: DEFAULT_BLOCK_ROWS,
        }
    }
}

impl EngineConfig {
    pub fn with_min_support(mut self, min_support: u32) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn with_popularity_weights(mut self, count_weight: f64, quality_weight: f64) -> Self {
        self.count_weight = count_weight;
        self.quality_weight = quality_weight;
        self
    }

    pub fn with_quality_scale(mut self, quality_scale: f64) -> Self {
        self.quality_scale = quality_scale;
        self
    }

    pub fn with_neighbor_count(mut self, neighbor_count: usize) -> Self {
        self.neighbor_count = neighbor_count;
        self
    }

    pub fn with_sparse_history_threshold(mut self, threshold: usize) -> Self {
        self.sparse_history_threshold = threshold;
        self
    }

    pub fn with_rating_range(mut self, rating_range: RatingRange) -> Self {
        self.rating_range = rating_range;
        self
    }

    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows;
        self
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), RecommendError> {
        if self.neighbor_count == 0 {
            return Err(RecommendError::InvalidNeighborCount);
        }
        if self.block_rows == 0 {
            return Err(RecommendError::InvalidArgument(
                "block_rows must be greater than 0".to_string(),
            ));
        }
        let weights = [self.count_weight, self.quality_weight, self.quality_scale];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(RecommendError::InvalidArgument(
                "popularity weights must be finite".to_string(),
            ));
        }
        let range = self.rating_range;
        if !(range.min.is_finite() && range.max.is_finite() && range.min <= range.max) {
            return Err(RecommendError::InvalidArgument(format!(
                "rating range {}..={} is empty",
                range.min, range.max
            )));
        }
        // The interaction matrix stores unrated cells as 0
        if range.min <= UNRATED {
            return Err(RecommendError::InvalidArgument(format!(
                "rating range must start above {}, got {}",
                UNRATED, range.min
            )));
        }
        Ok(())
    }
}
