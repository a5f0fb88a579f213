//! # Data Loader Crate
//!
//! Loads and indexes the catalog a recommendation engine runs against.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Item, RatingEvent, ItemStats, Catalog)
//! - **genres**: Multi-label genre index with a fixed vocabulary
//! - **parser**: Parse MovieLens CSV files into Rust structs
//! - **index**: Validate and build the Catalog
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Catalog, RatingRange};
//! use std::path::Path;
//!
//! let data_dir = Path::new("data/ml-latest-small");
//! let catalog = Catalog::load_from_dir(data_dir, RatingRange::default())?;
//!
//! let item = catalog.get_item(1).unwrap();
//! let stats = catalog.get_item_stats(1);
//! println!("{} has {:?}", item.title, stats);
//! ```

pub mod error;
pub mod genres;
pub mod index;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use genres::{GenreIndex, GenreMatcher};
pub use types::{Catalog, Item, ItemId, ItemStats, RatingEvent, RatingRange, UserId};

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_catalog() -> Catalog {
        let items = vec![
            Item::new(1, "Toy Story (1995)", ["Animation", "Children", "Comedy"]),
            Item::new(2, "Jumanji (1995)", ["Adventure", "Children", "Fantasy"]),
            Item::new(3, "Toy Soldiers (1991)", ["Action", "Drama"]),
        ];
        let ratings = vec![
            RatingEvent::new(1, 1, 4.0),
            RatingEvent::new(2, 1, 5.0),
            RatingEvent::new(2, 2, 3.0),
        ];
        Catalog::from_parts(items, ratings, RatingRange::default()).unwrap()
    }

    #[test]
    fn test_counts() {
        let catalog = create_test_catalog();
        assert_eq!(catalog.counts(), (3, 3, 2));
    }

    #[test]
    fn test_get_item() {
        let catalog = create_test_catalog();
        let item = catalog.get_item(2).unwrap();
        assert_eq!(item.title, "Jumanji (1995)");
        assert!(item.genres.contains("Fantasy"));
        assert!(catalog.get_item(999).is_none());
    }

    #[test]
    fn test_search_titles() {
        let catalog = create_test_catalog();

        let hits: Vec<ItemId> = catalog.search_titles("toy", 10).iter().map(|i| i.id).collect();
        assert_eq!(hits, vec![1, 3]);

        assert_eq!(catalog.search_titles("TOY", 1).len(), 1);
        assert!(catalog.search_titles("matrix", 10).is_empty());
    }

    #[test]
    fn test_rating_range() {
        let range = RatingRange::default();
        assert!(range.contains(0.5));
        assert!(range.contains(5.0));
        assert!(!range.contains(0.0));
        assert!(!range.contains(f32::NAN));
    }
}
