//! Popularity Source - Content-based ranking for users without history
//!
//! Ranks items by a blend of how often and how well they were rated:
//! `num_ratings * count_weight + avg_rating * quality_scale * quality_weight`.
//!
//! ## Algorithm
//! 1. Take every item with at least one rating event (never-rated items are
//!    not candidates at all)
//! 2. Keep items whose genres intersect the preferred genres, if any
//! 3. Drop items below the minimum support (default 20 ratings)
//! 4. Sort by blended score, descending; equal scores keep catalog order
//! 5. Return the top `limit`
//!
//! The catalog never changes, so steps 1, 3 and 4 are done once up front;
//! a request only filters the precomputed ranking by genre.

use crate::types::{Candidate, CandidateSource};
use data_loader::{Catalog, ItemId, ItemStats};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_MIN_SUPPORT: u32 = 20;
pub const DEFAULT_COUNT_WEIGHT: f64 = 0.3;
pub const DEFAULT_QUALITY_WEIGHT: f64 = 0.7;
pub const DEFAULT_QUALITY_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct RankedItem {
    item_id: ItemId,
    ranking_score: f64,
    stats: ItemStats,
}

/// Popularity source generates content-based candidates
#[derive(Debug, Clone)]
pub struct PopularityScorer {
    /// Shared reference to the catalog
    catalog: Arc<Catalog>,

    /// Minimum rating events for an item to be ranked
    min_support: u32,

    count_weight: f64,
    quality_weight: f64,
    quality_scale: f64,

    /// Eligible items, best first
    ranked: Vec<RankedItem>,
}

impl PopularityScorer {
    /// Create a new popularity scorer with the default weights
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let mut scorer = Self {
            catalog,
            min_support: DEFAULT_MIN_SUPPORT,
            count_weight: DEFAULT_COUNT_WEIGHT,
            quality_weight: DEFAULT_QUALITY_WEIGHT,
            quality_scale: DEFAULT_QUALITY_SCALE,
            ranked: Vec::new(),
        };
        scorer.rebuild_ranking();
        scorer
    }

    /// Configure minimum support (default: 20)
    pub fn with_min_support(mut self, min_support: u32) -> Self {
        self.min_support = min_support;
        self.rebuild_ranking();
        self
    }

    /// Configure count and quality weights (default: 0.3 / 0.7)
    pub fn with_weights(mut self, count_weight: f64, quality_weight: f64) -> Self {
        self.count_weight = count_weight;
        self.quality_weight = quality_weight;
        self.rebuild_ranking();
        self
    }

    /// Configure the factor that lifts mean ratings to count magnitude (default: 100)
    pub fn with_quality_scale(mut self, quality_scale: f64) -> Self {
        self.quality_scale = quality_scale;
        self.rebuild_ranking();
        self
    }

    pub fn min_support(&self) -> u32 {
        self.min_support
    }

    /// Blended ranking score for one item's statistics, in double precision
    pub fn ranking_score(&self, stats: &ItemStats) -> f64 {
        stats.num_ratings as f64 * self.count_weight
            + stats.avg_rating * self.quality_scale * self.quality_weight
    }

    /// Number of items that clear the minimum support
    pub fn eligible_count(&self) -> usize {
        self.ranked.len()
    }

    fn rebuild_ranking(&mut self) {
        let mut ranked: Vec<RankedItem> = self
            .catalog
            .items()
            .iter()
            .filter_map(|item| self.catalog.get_item_stats(item.id))
            .filter(|stats| stats.num_ratings >= self.min_support)
            .map(|stats| RankedItem {
                item_id: stats.item_id,
                ranking_score: self.ranking_score(stats),
                stats: *stats,
            })
            .collect();

        // Stable: equal scores stay in catalog order
        ranked.sort_by(|a, b| b.ranking_score.total_cmp(&a.ranking_score));
        self.ranked = ranked;
    }

    /// Top `limit` items for a user without history.
    ///
    /// Each candidate's score is the item's average rating; the blended
    /// ranking score rides along in the metadata. `None` or an empty set
    /// disables the genre filter.
    #[instrument(
        skip(self, preferred_genres),
        fields(genres = preferred_genres.map_or(0, |g| g.len()))
    )]
    pub fn score_for_new_user(
        &self,
        preferred_genres: Option<&HashSet<String>>,
        limit: usize,
    ) -> Vec<Candidate> {
        let empty = HashSet::new();
        let matcher = self
            .catalog
            .genre_index()
            .items_matching_any(preferred_genres.unwrap_or(&empty));

        let candidates: Vec<Candidate> = self
            .ranked
            .iter()
            .filter(|ranked| {
                self.catalog
                    .get_item(ranked.item_id)
                    .is_some_and(|item| matcher.matches(item))
            })
            .take(limit)
            .map(|ranked| {
                let mut candidate = Candidate::new(
                    ranked.item_id,
                    CandidateSource::Popularity,
                    ranked.stats.avg_rating as f32,
                );
                candidate.metadata.num_ratings = Some(ranked.stats.num_ratings);
                candidate.metadata.ranking_score = Some(ranked.ranking_score);
                candidate
            })
            .collect();

        debug!("Generated {} popularity candidates", candidates.len());
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Item, RatingEvent, RatingRange};

    fn repeat(item_id: ItemId, rating: f32, times: u32, first_user: u32) -> Vec<RatingEvent> {
        (0..times)
            .map(|i| RatingEvent::new(first_user + i, item_id, rating))
            .collect()
    }

    fn create_test_catalog() -> Arc<Catalog> {
        let items = vec![
            Item::new(1, "Loud Action", ["Action"]),
            Item::new(2, "Quiet Drama", ["Drama"]),
            Item::new(3, "Crowd Pleaser", ["Comedy", "Action"]),
            Item::new(4, "Twin A", ["Drama"]),
            Item::new(5, "Twin B", ["Drama"]),
            Item::new(6, "Never Rated", ["Action"]),
            Item::new(7, "Cult Classic", ["Comedy"]),
        ];
        let mut ratings = Vec::new();
        ratings.extend(repeat(1, 4.0, 30, 0));
        ratings.extend(repeat(2, 4.5, 25, 100));
        ratings.extend(repeat(3, 3.5, 200, 200));
        ratings.extend(repeat(4, 4.0, 20, 500));
        ratings.extend(repeat(5, 4.0, 20, 600));
        // Perfect score, far too little support
        ratings.extend(repeat(7, 5.0, 19, 700));
        Arc::new(Catalog::from_parts(items, ratings, RatingRange::default()).unwrap())
    }

    fn ids(candidates: &[Candidate]) -> Vec<ItemId> {
        candidates.iter().map(|c| c.item_id).collect()
    }

    fn genres(list: &[&str]) -> HashSet<String> {
        list.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_ranking_formula() {
        let scorer = PopularityScorer::new(create_test_catalog());
        let stats = ItemStats {
            item_id: 1,
            num_ratings: 30,
            avg_rating: 4.0,
        };
        // 30 * 0.3 + 4.0 * 100 * 0.7
        assert!((scorer.ranking_score(&stats) - 289.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_score_keeps_double_precision() {
        let items = vec![Item::new(1, "Thirds", ["Drama"])];
        let ratings = vec![
            RatingEvent::new(1, 1, 4.0),
            RatingEvent::new(2, 1, 4.0),
            RatingEvent::new(3, 1, 3.5),
        ];
        let catalog =
            Arc::new(Catalog::from_parts(items, ratings, RatingRange::default()).unwrap());
        let stats = *catalog.get_item_stats(1).unwrap();
        assert_eq!(stats.avg_rating, 11.5 / 3.0);

        let scorer = PopularityScorer::new(catalog);
        let expected = 3.0 * 0.3 + (11.5 / 3.0) * 100.0 * 0.7;
        assert!((scorer.ranking_score(&stats) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_and_thresholded() {
        let scorer = PopularityScorer::new(create_test_catalog());
        let candidates = scorer.score_for_new_user(None, 10);

        // 3: 60 + 245 = 305, 2: 7.5 + 315 = 322.5, 1: 9 + 280 = 289, 4/5: 6 + 280 = 286
        assert_eq!(ids(&candidates), vec![2, 3, 1, 4, 5]);
        assert!(candidates.iter().all(|c| c.metadata.num_ratings.unwrap_or(0) >= 20));
        assert!(candidates.iter().all(|c| c.source == CandidateSource::Popularity));
        assert!((candidates[0].score - 4.5).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let scorer = PopularityScorer::new(create_test_catalog());
        let candidates = scorer.score_for_new_user(Some(&genres(&["Drama"])), 10);
        assert_eq!(ids(&candidates), vec![2, 4, 5]);
        assert_eq!(
            candidates[1].metadata.ranking_score,
            candidates[2].metadata.ranking_score
        );
    }

    #[test]
    fn test_genre_filter() {
        let scorer = PopularityScorer::new(create_test_catalog());

        let action = scorer.score_for_new_user(Some(&genres(&["Action"])), 10);
        assert_eq!(ids(&action), vec![3, 1]);

        let empty_filter = scorer.score_for_new_user(Some(&HashSet::new()), 10);
        assert_eq!(empty_filter.len(), 5);

        let unknown = scorer.score_for_new_user(Some(&genres(&["Western"])), 10);
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_limit() {
        let scorer = PopularityScorer::new(create_test_catalog());
        assert_eq!(ids(&scorer.score_for_new_user(None, 2)), vec![2, 3]);
        assert!(scorer.score_for_new_user(None, 0).is_empty());
    }

    #[test]
    fn test_min_support_is_configurable() {
        let scorer = PopularityScorer::new(create_test_catalog()).with_min_support(10);
        let candidates = scorer.score_for_new_user(Some(&genres(&["Comedy"])), 10);
        // 7: 5.7 + 350 beats 3: 60 + 245
        assert_eq!(ids(&candidates), vec![7, 3]);
        assert_eq!(scorer.eligible_count(), 6);
    }

    #[test]
    fn test_single_eligible_item() {
        let items = vec![Item::new(1, "A", ["Action"]), Item::new(2, "B", ["Drama"])];
        let mut ratings = repeat(1, 4.5, 25, 0);
        ratings.extend(repeat(2, 3.0, 5, 100));
        let catalog =
            Arc::new(Catalog::from_parts(items, ratings, RatingRange::default()).unwrap());

        let candidates = PopularityScorer::new(catalog).score_for_new_user(None, 10);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].item_id, 1);
        assert!((candidates[0].score - 4.5).abs() < 1e-6);
    }
}
