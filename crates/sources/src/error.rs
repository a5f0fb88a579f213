//! Error taxonomy for scoring requests.
//!
//! Three families:
//! - invalid input: the caller broke a contract, reject immediately
//! - data unavailable: there is nothing to score against
//! - budget exceeded: the request ran out of wall-clock time between blocks
//!
//! An empty result is not an error and never shows up here.

use data_loader::{DataLoadError, ItemId};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Invalid input: limit must be greater than 0")]
    InvalidLimit,

    #[error("Invalid input: neighbor count must be greater than 0")]
    InvalidNeighborCount,

    #[error("Invalid input: rating {rating} for item {item_id} is outside {min}..={max}")]
    RatingOutOfRange {
        item_id: ItemId,
        rating: f32,
        min: f32,
        max: f32,
    },

    #[error("Invalid input: query contains no ratings")]
    EmptyQuery,

    #[error("Invalid input: query vector has {found} entries, matrix has {expected} columns")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid input: {0}")]
    InvalidArgument(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Request budget of {budget:?} exceeded after {elapsed:?}")]
    BudgetExceeded { budget: Duration, elapsed: Duration },

    #[error(transparent)]
    Data(#[from] DataLoadError),
}

impl RecommendError {
    /// True for caller contract violations
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RecommendError::InvalidLimit
                | RecommendError::InvalidNeighborCount
                | RecommendError::RatingOutOfRange { .. }
                | RecommendError::EmptyQuery
                | RecommendError::DimensionMismatch { .. }
                | RecommendError::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
