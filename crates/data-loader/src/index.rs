//! Catalog construction.
//!
//! Builds the immutable Catalog from parsed data:
//! - primary index (item id -> position)
//! - genre index
//! - per-item rating statistics
//! - validation of every rating event

use crate::error::{DataLoadError, Result};
use crate::genres::GenreIndex;
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// File names expected inside a MovieLens export directory
pub const ITEMS_FILE: &str = "movies.csv";
pub const RATINGS_FILE: &str = "ratings.csv";

impl Catalog {
    /// Load a MovieLens CSV export (movies.csv + ratings.csv) from a directory
    pub fn load_from_dir(data_dir: &Path, rating_range: RatingRange) -> Result<Self> {
        info!("Loading catalog from {:?}", data_dir);

        let items_path = data_dir.join(ITEMS_FILE);
        let ratings_path = data_dir.join(RATINGS_FILE);

        // Both files are independent, parse them side by side
        let (items, ratings) = rayon::join(
            || parser::parse_items(&items_path),
            || parser::parse_ratings(&ratings_path),
        );
        let items = items?;
        let ratings = ratings?;

        info!("Parsed {} items, {} ratings", items.len(), ratings.len());
        Self::from_parts(items, ratings, rating_range)
    }

    /// Build a catalog from in-memory data, deriving the genre vocabulary
    pub fn from_parts(
        items: Vec<Item>,
        ratings: Vec<RatingEvent>,
        rating_range: RatingRange,
    ) -> Result<Self> {
        let genre_index = GenreIndex::from_items(&items);
        Self::assemble(items, ratings, genre_index, rating_range)
    }

    /// Build a catalog with a loader-supplied genre vocabulary
    pub fn from_parts_with_vocabulary(
        items: Vec<Item>,
        ratings: Vec<RatingEvent>,
        vocabulary: Vec<String>,
        rating_range: RatingRange,
    ) -> Result<Self> {
        let genre_index = GenreIndex::with_vocabulary(vocabulary, &items)?;
        Self::assemble(items, ratings, genre_index, rating_range)
    }

    fn assemble(
        items: Vec<Item>,
        ratings: Vec<RatingEvent>,
        genre_index: GenreIndex,
        rating_range: RatingRange,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(DataLoadError::DataUnavailable("no items supplied".to_string()));
        }
        if ratings.is_empty() {
            return Err(DataLoadError::DataUnavailable(
                "no rating events supplied".to_string(),
            ));
        }

        let mut item_positions = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            if item_positions.insert(item.id, pos).is_some() {
                return Err(DataLoadError::ValidationError(format!(
                    "duplicate item id {}",
                    item.id
                )));
            }
        }

        let mut catalog = Catalog {
            items,
            item_positions,
            ratings,
            item_stats: HashMap::new(),
            genre_index,
            rating_range,
        };
        catalog.validate()?;
        catalog.compute_item_stats();

        let (items, ratings, users) = catalog.counts();
        info!(
            "Catalog ready: {} items, {} ratings, {} users, {} genres",
            items,
            ratings,
            users,
            catalog.genre_index.len()
        );
        Ok(catalog)
    }

    /// Every rating must point at a known item and lie inside the range
    fn validate(&self) -> Result<()> {
        for rating in &self.ratings {
            if !self.item_positions.contains_key(&rating.item_id) {
                return Err(DataLoadError::MissingReference {
                    entity: "Item".to_string(),
                    id: rating.item_id,
                });
            }
            if !self.rating_range.contains(rating.rating) {
                return Err(DataLoadError::InvalidValue {
                    field: "rating".to_string(),
                    value: rating.rating.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Group rating events by item and compute count and mean.
    ///
    /// Duplicate (user, item) events are all counted.
    fn compute_item_stats(&mut self) {
        let sums = self
            .ratings
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<ItemId, (f64, u32)>, rating| {
                let entry = acc.entry(rating.item_id).or_insert((0.0, 0));
                entry.0 += rating.rating as f64;
                entry.1 += 1;
                acc
            })
            .reduce(HashMap::new, |mut acc, local| {
                for (item_id, (sum, count)) in local {
                    let entry = acc.entry(item_id).or_insert((0.0, 0));
                    entry.0 += sum;
                    entry.1 += count;
                }
                acc
            });

        self.item_stats = sums
            .into_iter()
            .map(|(item_id, (sum, count))| {
                let stats = ItemStats {
                    item_id,
                    num_ratings: count,
                    avg_rating: sum / count as f64,
                };
                (item_id, stats)
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<Item> {
        vec![
            Item::new(1, "A", ["Action"]),
            Item::new(2, "B", ["Drama"]),
            Item::new(3, "C", ["Comedy"]),
        ]
    }

    #[test]
    fn test_item_stats() {
        let ratings = vec![
            RatingEvent::new(1, 1, 4.0),
            RatingEvent::new(2, 1, 5.0),
            RatingEvent::new(3, 1, 3.0),
            RatingEvent::new(1, 2, 2.5),
        ];
        let catalog = Catalog::from_parts(items(), ratings, RatingRange::default()).unwrap();

        let stats = catalog.get_item_stats(1).unwrap();
        assert_eq!(stats.num_ratings, 3);
        assert!((stats.avg_rating - 4.0).abs() < 1e-6);

        assert_eq!(catalog.get_item_stats(2).unwrap().num_ratings, 1);
        // Never rated: no stats rather than zeros
        assert!(catalog.get_item_stats(3).is_none());
    }

    #[test]
    fn test_duplicate_events_are_all_counted() {
        let ratings = vec![RatingEvent::new(1, 1, 2.0), RatingEvent::new(1, 1, 4.0)];
        let catalog = Catalog::from_parts(items(), ratings, RatingRange::default()).unwrap();

        let stats = catalog.get_item_stats(1).unwrap();
        assert_eq!(stats.num_ratings, 2);
        assert!((stats.avg_rating - 3.0).abs() < 1e-6);
        assert_eq!(catalog.ratings().len(), 2);
    }

    #[test]
    fn test_rejects_unknown_item() {
        let ratings = vec![RatingEvent::new(1, 42, 4.0)];
        let result = Catalog::from_parts(items(), ratings, RatingRange::default());
        assert!(matches!(result, Err(DataLoadError::MissingReference { id: 42, .. })));
    }

    #[test]
    fn test_rejects_out_of_range_rating() {
        let ratings = vec![RatingEvent::new(1, 1, 5.5)];
        let result = Catalog::from_parts(items(), ratings, RatingRange::default());
        assert!(matches!(result, Err(DataLoadError::InvalidValue { .. })));

        let ratings = vec![RatingEvent::new(1, 1, f32::NAN)];
        let result = Catalog::from_parts(items(), ratings, RatingRange::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_item_ids() {
        let mut items = items();
        items.push(Item::new(1, "A again", ["Action"]));
        let ratings = vec![RatingEvent::new(1, 1, 4.0)];
        let result = Catalog::from_parts(items, ratings, RatingRange::default());
        assert!(matches!(result, Err(DataLoadError::ValidationError(_))));
    }

    #[test]
    fn test_refuses_empty_data() {
        let ratings = vec![RatingEvent::new(1, 1, 4.0)];
        let result = Catalog::from_parts(Vec::new(), ratings, RatingRange::default());
        assert!(matches!(result, Err(DataLoadError::DataUnavailable(_))));

        let result = Catalog::from_parts(items(), Vec::new(), RatingRange::default());
        assert!(matches!(result, Err(DataLoadError::DataUnavailable(_))));
    }

    #[test]
    fn test_load_dataset() {
        // Requires a MovieLens export, e.g. ml-latest-small, in ../../data/
        let data_dir = Path::new("../../data/ml-latest-small");

        if data_dir.exists() {
            let catalog = Catalog::load_from_dir(data_dir, RatingRange::default()).unwrap();
            let (items, ratings, users) = catalog.counts();
            assert!(items > 0);
            assert!(ratings > 0);
            assert!(users > 0);
        }
    }
}
