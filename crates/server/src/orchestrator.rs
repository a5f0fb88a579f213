//! # Recommendation Orchestrator
//!
//! Async front of the engine:
//! 1. Snapshot the current engine from the [`EngineHandle`]
//! 2. Start the request budget
//! 3. Run the scoring on the blocking pool with `spawn_blocking`
//! 4. Log timing and hand back the ranked recommendations
//!
//! Reloading builds a new engine off the request path and swaps it in
//! whole. Requests already running keep the snapshot they started with.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use sources::{Budget, UserRatingQuery};

use crate::config::EngineConfig;
use crate::engine::{EngineSummary, Recommendation, RecommendationEngine};

/// Shared slot holding the engine that serves new requests
pub struct EngineHandle {
    current: RwLock<Arc<RecommendationEngine>>,
}

impl EngineHandle {
    pub fn new(engine: RecommendationEngine) -> Self {
        Self {
            current: RwLock::new(Arc::new(engine)),
        }
    }

    /// The engine new requests should use
    pub fn snapshot(&self) -> Arc<RecommendationEngine> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `engine`, returning the one it replaced
    pub fn swap(&self, engine: RecommendationEngine) -> Arc<RecommendationEngine> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(engine))
    }
}

/// One hybrid request
#[derive(Debug, Clone, Default)]
pub struct RecommendationRequest {
    pub user_ratings: Option<UserRatingQuery>,
    pub preferred_genres: Option<HashSet<String>>,
    pub limit: usize,
}

impl RecommendationRequest {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_ratings(mut self, user_ratings: UserRatingQuery) -> Self {
        self.user_ratings = Some(user_ratings);
        self
    }

    pub fn with_genres(mut self, preferred_genres: HashSet<String>) -> Self {
        self.preferred_genres = Some(preferred_genres);
        self
    }
}

/// Runs requests against the current engine; cheap to clone
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    handle: Arc<EngineHandle>,
    request_budget: Option<Duration>,
}

impl RecommendationOrchestrator {
    pub fn new(engine: RecommendationEngine) -> Self {
        Self {
            handle: Arc::new(EngineHandle::new(engine)),
            request_budget: None,
        }
    }

    /// Abort requests that run longer than `budget`
    pub fn with_request_budget(mut self, budget: Duration) -> Self {
        self.request_budget = Some(budget);
        self
    }

    pub fn engine(&self) -> Arc<RecommendationEngine> {
        self.handle.snapshot()
    }

    pub fn summary(&self) -> EngineSummary {
        self.handle.snapshot().summary()
    }

    /// Swap in a prebuilt engine
    pub fn reload(&self, engine: RecommendationEngine) {
        let previous = self.handle.swap(engine);
        info!(
            "Engine swapped, {} requests still hold the previous one",
            Arc::strong_count(&previous) - 1
        );
    }

    /// Load a fresh catalog from `data_dir` and swap it in once built.
    ///
    /// On failure the current engine keeps serving.
    pub async fn reload_from_dir(&self, data_dir: PathBuf, config: EngineConfig) -> Result<()> {
        let start = Instant::now();
        let dir_display = data_dir.display().to_string();

        let engine = tokio::task::spawn_blocking(move || {
            RecommendationEngine::load_from_dir(&data_dir, config)
        })
        .await
        .context("Reload task panicked")?
        .with_context(|| format!("Failed to reload engine from {}", dir_display))?;

        self.reload(engine);
        info!("Reloaded engine from {} in {:.2?}", dir_display, start.elapsed());
        Ok(())
    }

    /// Main entry point: hybrid recommendations for one request
    pub async fn get_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> Result<Vec<Recommendation>> {
        let start_time = Instant::now();
        let engine = self.handle.snapshot();
        let budget = self.budget();
        let ratings = request.user_ratings.as_ref().map_or(0, UserRatingQuery::len);

        let recommendations = tokio::task::spawn_blocking(move || {
            engine.recommend(
                request.user_ratings.as_ref(),
                request.preferred_genres.as_ref(),
                request.limit,
                &budget,
            )
        })
        .await
        .context("Recommendation task panicked")??;

        let elapsed = start_time.elapsed();
        if self.request_budget.is_some_and(|limit| elapsed > limit) {
            warn!(
                "Request with {} ratings finished over budget in {:.2?}",
                ratings, elapsed
            );
        }
        info!(
            "Served {} recommendations for {} ratings in {:.2?}",
            recommendations.len(),
            ratings,
            elapsed
        );
        Ok(recommendations)
    }

    /// Collaborative-only scoring with an explicit neighbor count
    pub async fn get_personalized(
        &self,
        user_ratings: UserRatingQuery,
        limit: usize,
        neighbor_count: Option<usize>,
    ) -> Result<Vec<Recommendation>> {
        let start_time = Instant::now();
        let engine = self.handle.snapshot();
        let budget = self.budget();

        let recommendations = tokio::task::spawn_blocking(move || {
            engine.score_from_ratings(&user_ratings, limit, neighbor_count, &budget)
        })
        .await
        .context("Collaborative task panicked")??;

        info!(
            "Served {} personalized recommendations in {:.2?}",
            recommendations.len(),
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    fn budget(&self) -> Budget {
        match self.request_budget {
            Some(limit) => Budget::new(limit),
            None => Budget::unlimited(),
        }
    }
}
