//! Core domain types for the recommendation catalog.
//!
//! The Catalog is the leaf data structure: an immutable registry of items
//! and the raw rating events recorded against them. Everything else in the
//! workspace queries it, nothing mutates it after construction.

use crate::genres::GenreIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for an item (a movie in the MovieLens data)
pub type ItemId = u32;

// =============================================================================
// Item
// =============================================================================

/// An item that can be recommended.
///
/// Identity is `id`; titles are not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// Genre labels, kept as a set so duplicates in the source collapse
    pub genres: BTreeSet<String>,
}

impl Item {
    /// Convenience constructor used heavily by fixtures
    pub fn new<I, S>(id: ItemId, title: impl Into<String>, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            title: title.into(),
            genres: genres.into_iter().map(Into::into).collect(),
        }
    }

    /// True if this item carries at least one of the given genres
    pub fn has_any_genre(&self, genres: &HashSet<String>) -> bool {
        self.genres.iter().any(|g| genres.contains(g))
    }
}

// =============================================================================
// Rating Events
// =============================================================================

/// A single rating a user gave to an item.
///
/// Duplicates for the same (user, item) pair are kept verbatim in the
/// Catalog; consumers that need one value per pair take the last one seen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f32,
}

impl RatingEvent {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// Inclusive range of valid rating values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    pub min: f32,
    pub max: f32,
}

impl RatingRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// NaN is never contained
    pub fn contains(&self, rating: f32) -> bool {
        rating >= self.min && rating <= self.max
    }
}

impl Default for RatingRange {
    /// MovieLens half-star scale
    fn default() -> Self {
        Self::new(0.5, 5.0)
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate statistics for an item with at least one rating event.
///
/// Items without ratings have no `ItemStats` at all; callers get `None`
/// rather than a zero-filled record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub item_id: ItemId,
    /// Count of rating events, duplicates included
    pub num_ratings: u32,
    /// Arithmetic mean over all rating events
    pub avg_rating: f64,
}

// =============================================================================
// Catalog
// =============================================================================

/// Immutable registry of items, rating events and derived indices.
///
/// Built once through [`Catalog::from_parts`] or [`Catalog::load_from_dir`];
/// there are no mutators.
#[derive(Debug)]
pub struct Catalog {
    /// Items in load order; this order is the tie-break order for rankings
    pub(crate) items: Vec<Item>,
    pub(crate) item_positions: HashMap<ItemId, usize>,

    /// Raw rating events in load order
    pub(crate) ratings: Vec<RatingEvent>,

    pub(crate) item_stats: HashMap<ItemId, ItemStats>,
    pub(crate) genre_index: GenreIndex,
    pub(crate) rating_range: RatingRange,
}

impl Catalog {
    /// All items in load order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Get an item by ID
    pub fn get_item(&self, id: ItemId) -> Option<&Item> {
        self.item_positions.get(&id).map(|&pos| &self.items[pos])
    }

    /// Raw rating events in load order
    pub fn ratings(&self) -> &[RatingEvent] {
        &self.ratings
    }

    /// Statistics for an item, `None` if it was never rated
    pub fn get_item_stats(&self, id: ItemId) -> Option<&ItemStats> {
        self.item_stats.get(&id)
    }

    pub fn genre_index(&self) -> &GenreIndex {
        &self.genre_index
    }

    pub fn rating_range(&self) -> RatingRange {
        self.rating_range
    }

    /// Case-insensitive substring search over titles, in catalog order
    pub fn search_titles(&self, query: &str, limit: usize) -> Vec<&Item> {
        let needle = query.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.title.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    /// (items, rating events, distinct users)
    pub fn counts(&self) -> (usize, usize, usize) {
        let users: HashSet<UserId> = self.ratings.iter().map(|r| r.user_id).collect();
        (self.items.len(), self.ratings.len(), users.len())
    }
}
