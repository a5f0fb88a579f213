//! # Sources Crate
//!
//! The two scoring strategies a hybrid recommender blends, plus the
//! structures they run on.
//!
//! ## Components
//!
//! ### Popularity Source (content-based)
//! For users without history:
//! - Rating count and mean rating blended into one score
//! - Optional preferred-genre filter
//! - Minimum-support threshold so one 5-star rating cannot win
//!
//! ### Collaborative Source
//! For users with history:
//! - Dense user x item [`InteractionMatrix`]
//! - Cosine [`NeighborSearch`] over all rows, scanned in parallel blocks
//! - Similarity-weighted average rating for items the user has not rated
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{
//!     Budget, CollaborativeScorer, InteractionMatrix, PopularityScorer, UserRatingQuery,
//! };
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(catalog);
//! let matrix = Arc::new(InteractionMatrix::from_catalog(&catalog)?);
//!
//! let popular = PopularityScorer::new(catalog.clone()).score_for_new_user(None, 10);
//!
//! let query: UserRatingQuery = vec![(296, 5.0), (318, 4.5)].into_iter().collect();
//! let personal = CollaborativeScorer::new(matrix)
//!     .score_from_ratings(&query, 10, 20, &Budget::unlimited())?;
//! ```

pub mod collaborative;
pub mod error;
pub mod matrix;
pub mod popularity;
pub mod similarity;
pub mod types;

// Re-export commonly used types
pub use collaborative::CollaborativeScorer;
pub use error::{RecommendError, Result};
pub use matrix::{InteractionMatrix, QueryVector};
pub use popularity::PopularityScorer;
pub use similarity::{Neighbor, NeighborSearch, cosine_similarity};
pub use types::{Budget, Candidate, CandidateMetadata, CandidateSource, UserRatingQuery};
