//! # Recommendation Engine
//!
//! Owns the catalog, the interaction matrix and both scorers, and picks
//! which scorer answers a request from how much history the caller gave:
//!
//! | caller ratings | strategy |
//! |---|---|
//! | none | popularity, optionally genre filtered |
//! | fewer than the sparse threshold | collaborative half, popularity fills the rest |
//! | at least the sparse threshold | collaborative only |
//!
//! The engine is immutable after construction and is shared across
//! requests behind an `Arc`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument};

use data_loader::{Catalog, Item, ItemId};
use sources::{
    Budget, Candidate, CandidateMetadata, CandidateSource, CollaborativeScorer, InteractionMatrix,
    PopularityScorer, RecommendError, Result, UserRatingQuery,
};

use crate::config::EngineConfig;

/// A scored item joined back to its catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    pub genres: Vec<String>,
    /// Average rating (popularity) or predicted rating (collaborative)
    pub score: f32,
    pub source: CandidateSource,
    pub metadata: CandidateMetadata,
    pub explanation: String,
}

/// Which branch of the hybrid selector serves a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Popularity,
    Blended,
    Collaborative,
}

/// Sizes of the loaded data, for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSummary {
    pub items: usize,
    pub rating_events: usize,
    pub users: usize,
    pub matrix_rows: usize,
    pub matrix_columns: usize,
    pub genres: usize,
    /// Items that clear the popularity support threshold
    pub popular_items: usize,
}

pub struct RecommendationEngine {
    catalog: Arc<Catalog>,
    matrix: Arc<InteractionMatrix>,
    popularity: PopularityScorer,
    collaborative: CollaborativeScorer,
    config: EngineConfig,
}

impl RecommendationEngine {
    /// Build the matrix and both scorers over `catalog`.
    ///
    /// Fails with `DataUnavailable` when the catalog has nothing to score.
    #[instrument(skip(catalog, config))]
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let matrix = Arc::new(InteractionMatrix::from_catalog(&catalog)?);
        let popularity = PopularityScorer::new(catalog.clone())
            .with_min_support(config.min_support)
            .with_weights(config.count_weight, config.quality_weight)
            .with_quality_scale(config.quality_scale);
        let collaborative = CollaborativeScorer::new(matrix.clone())
            .with_default_neighbor_count(config.neighbor_count)
            .with_block_rows(config.block_rows);

        info!(
            "Engine ready in {:.2?}: {} x {} matrix, {} popular items",
            start.elapsed(),
            matrix.num_rows(),
            matrix.num_columns(),
            popularity.eligible_count()
        );

        Ok(Self {
            catalog,
            matrix,
            popularity,
            collaborative,
            config,
        })
    }

    /// Load `movies.csv` and `ratings.csv` from `data_dir` and build an engine
    pub fn load_from_dir(data_dir: &Path, config: EngineConfig) -> Result<Self> {
        let catalog = Catalog::load_from_dir(data_dir, config.rating_range)?;
        Self::new(Arc::new(catalog), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn matrix(&self) -> &Arc<InteractionMatrix> {
        &self.matrix
    }

    /// Branch the hybrid selector takes for this history
    pub fn strategy_for(&self, user_ratings: Option<&UserRatingQuery>) -> Strategy {
        match user_ratings.map_or(0, UserRatingQuery::len) {
            0 => Strategy::Popularity,
            n if n < self.config.sparse_history_threshold => Strategy::Blended,
            _ => Strategy::Collaborative,
        }
    }

    /// Popular items for a caller with no history
    pub fn score_for_new_user(
        &self,
        preferred_genres: Option<&HashSet<String>>,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        validate_limit(limit)?;
        let candidates = self.popularity.score_for_new_user(preferred_genres, limit);
        Ok(self.enrich(candidates))
    }

    /// Predicted ratings from the caller's own ratings.
    ///
    /// `neighbor_count` falls back to the configured default.
    pub fn score_from_ratings(
        &self,
        user_ratings: &UserRatingQuery,
        limit: usize,
        neighbor_count: Option<usize>,
        budget: &Budget,
    ) -> Result<Vec<Recommendation>> {
        validate_limit(limit)?;
        if user_ratings.is_empty() {
            return Err(RecommendError::EmptyQuery);
        }
        user_ratings.validate(self.config.rating_range)?;
        let neighbor_count = neighbor_count.unwrap_or(self.config.neighbor_count);
        if neighbor_count == 0 {
            return Err(RecommendError::InvalidNeighborCount);
        }

        let candidates =
            self.collaborative
                .score_from_ratings(user_ratings, limit, neighbor_count, budget)?;
        Ok(self.enrich(candidates))
    }

    /// Hybrid entry point: route by history length, see the module docs.
    ///
    /// Genre preferences only apply to the popularity share of a result.
    #[instrument(skip_all, fields(ratings = user_ratings.map_or(0, |r| r.len()), limit = limit))]
    pub fn recommend(
        &self,
        user_ratings: Option<&UserRatingQuery>,
        preferred_genres: Option<&HashSet<String>>,
        limit: usize,
        budget: &Budget,
    ) -> Result<Vec<Recommendation>> {
        validate_limit(limit)?;
        if let Some(ratings) = user_ratings {
            ratings.validate(self.config.rating_range)?;
        }

        let strategy = self.strategy_for(user_ratings);
        debug!("Serving request with {:?} strategy", strategy);

        let candidates = match (strategy, user_ratings) {
            (Strategy::Blended, Some(ratings)) => {
                self.blend(ratings, preferred_genres, limit, budget)?
            }
            (Strategy::Collaborative, Some(ratings)) => self.collaborative.score_from_ratings(
                ratings,
                limit,
                self.config.neighbor_count,
                budget,
            )?,
            _ => self.popularity.score_for_new_user(preferred_genres, limit),
        };

        Ok(self.enrich(candidates))
    }

    /// Sorted genre vocabulary
    pub fn all_genres(&self) -> &[String] {
        self.catalog.genre_index().all_genres()
    }

    /// Case-insensitive title substring search, in catalog order
    pub fn search_items(&self, query: &str, limit: usize) -> Result<Vec<&Item>> {
        validate_limit(limit)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(RecommendError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }
        Ok(self.catalog.search_titles(query, limit))
    }

    pub fn summary(&self) -> EngineSummary {
        let (items, rating_events, users) = self.catalog.counts();
        EngineSummary {
            items,
            rating_events,
            users,
            matrix_rows: self.matrix.num_rows(),
            matrix_columns: self.matrix.num_columns(),
            genres: self.catalog.genre_index().len(),
            popular_items: self.popularity.eligible_count(),
        }
    }

    /// Collaborative picks take the first half; popularity fills the rest.
    ///
    /// First occurrence of an item wins, so a collaborative pick is never
    /// repeated by the popularity share.
    fn blend(
        &self,
        user_ratings: &UserRatingQuery,
        preferred_genres: Option<&HashSet<String>>,
        limit: usize,
        budget: &Budget,
    ) -> Result<Vec<Candidate>> {
        let collab_limit = limit / 2;
        let content_limit = limit - collab_limit;

        let collaborative = self.collaborative.score_from_ratings(
            user_ratings,
            collab_limit,
            self.config.neighbor_count,
            budget,
        )?;
        let popular = self
            .popularity
            .score_for_new_user(preferred_genres, content_limit);

        let collab_len = collaborative.len();
        let popular_len = popular.len();

        let mut seen: HashSet<ItemId> = HashSet::with_capacity(limit);
        let merged: Vec<Candidate> = collaborative
            .into_iter()
            .chain(popular)
            .filter(|candidate| seen.insert(candidate.item_id))
            .take(limit)
            .collect();

        debug!(
            "Blended candidates: collaborative={}, popularity={}, total_after_dedup={}",
            collab_len,
            popular_len,
            merged.len()
        );
        Ok(merged)
    }

    /// Join candidates to catalog metadata, keeping their order
    fn enrich(&self, candidates: Vec<Candidate>) -> Vec<Recommendation> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let item = self.catalog.get_item(candidate.item_id)?;
                Some(Recommendation {
                    item_id: candidate.item_id,
                    title: item.title.clone(),
                    genres: item.genres.iter().cloned().collect(),
                    score: candidate.score,
                    source: candidate.source,
                    explanation: explain(&candidate),
                    metadata: candidate.metadata,
                })
            })
            .collect()
    }
}

fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(RecommendError::InvalidLimit);
    }
    Ok(())
}

fn explain(candidate: &Candidate) -> String {
    match candidate.source {
        CandidateSource::Popularity => match candidate.metadata.num_ratings {
            Some(count) => format!(
                "Popular pick: average {:.2} over {} ratings",
                candidate.score, count
            ),
            None => format!("Popular pick: average {:.2}", candidate.score),
        },
        CandidateSource::Collaborative => match candidate.metadata.neighbor_support {
            Some(support) => format!(
                "Predicted {:.2} from {} similar users",
                candidate.score, support
            ),
            None => format!("Predicted {:.2}", candidate.score),
        },
    }
}
