//! Multi-label genre index.
//!
//! The vocabulary order is fixed once, when the index is built, and never
//! changes afterwards. `encode` rows and class indices are relative to it.

use crate::error::{DataLoadError, Result};
use crate::types::{Item, ItemId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Genre vocabulary plus per-genre and per-item lookups
#[derive(Debug, Clone, Default)]
pub struct GenreIndex {
    vocabulary: Vec<String>,
    positions: HashMap<String, usize>,
    /// Items per class, in item load order
    by_genre: Vec<Vec<ItemId>>,
    /// Sorted class indices per item
    labels: HashMap<ItemId, Vec<usize>>,
}

impl GenreIndex {
    /// Derive the vocabulary from the items themselves, sorted lexically.
    pub fn from_items(items: &[Item]) -> Self {
        let vocabulary: BTreeSet<&str> = items
            .iter()
            .flat_map(|item| item.genres.iter().map(String::as_str))
            .collect();
        let vocabulary = vocabulary.into_iter().map(str::to_string).collect();

        // Every genre is in the vocabulary by construction
        Self::build(vocabulary, items)
    }

    /// Use a vocabulary supplied by the loader.
    ///
    /// Fails if the vocabulary repeats an entry or an item carries a genre
    /// the vocabulary does not know.
    pub fn with_vocabulary(vocabulary: Vec<String>, items: &[Item]) -> Result<Self> {
        let mut seen = HashSet::new();
        for genre in &vocabulary {
            if !seen.insert(genre.as_str()) {
                return Err(DataLoadError::ValidationError(format!(
                    "duplicate genre '{}' in vocabulary",
                    genre
                )));
            }
        }
        for item in items {
            if let Some(unknown) = item.genres.iter().find(|g| !seen.contains(g.as_str())) {
                return Err(DataLoadError::InvalidValue {
                    field: format!("genres of item {}", item.id),
                    value: unknown.clone(),
                });
            }
        }
        Ok(Self::build(vocabulary, items))
    }

    fn build(vocabulary: Vec<String>, items: &[Item]) -> Self {
        let positions: HashMap<String, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(idx, genre)| (genre.clone(), idx))
            .collect();

        let mut by_genre = vec![Vec::new(); vocabulary.len()];
        let mut labels = HashMap::with_capacity(items.len());
        for item in items {
            let mut classes: Vec<usize> = item
                .genres
                .iter()
                .filter_map(|g| positions.get(g).copied())
                .collect();
            classes.sort_unstable();
            for &class in &classes {
                by_genre[class].push(item.id);
            }
            labels.insert(item.id, classes);
        }

        Self {
            vocabulary,
            positions,
            by_genre,
            labels,
        }
    }

    /// The full vocabulary, in its fixed order
    pub fn all_genres(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Items labelled with `genre`, empty for unknown genres
    pub fn items_in_genre(&self, genre: &str) -> &[ItemId] {
        self.positions
            .get(genre)
            .map(|&class| self.by_genre[class].as_slice())
            .unwrap_or(&[])
    }

    /// Dense 0/1 indicator row for an item, aligned to `all_genres()`
    pub fn encode(&self, item_id: ItemId) -> Option<Vec<u8>> {
        let classes = self.labels.get(&item_id)?;
        let mut row = vec![0u8; self.vocabulary.len()];
        for &class in classes {
            row[class] = 1;
        }
        Some(row)
    }

    /// Build a predicate that keeps items sharing at least one genre with
    /// `genres`. An empty set keeps everything; genres outside the
    /// vocabulary can never match.
    pub fn items_matching_any(&self, genres: &HashSet<String>) -> GenreMatcher {
        if genres.is_empty() {
            return GenreMatcher::Any;
        }
        let known = genres
            .iter()
            .filter(|g| self.positions.contains_key(g.as_str()))
            .cloned()
            .collect();
        GenreMatcher::AnyOf(known)
    }
}

/// Predicate produced by [`GenreIndex::items_matching_any`]
#[derive(Debug, Clone, PartialEq)]
pub enum GenreMatcher {
    /// No genre filter was requested
    Any,
    /// Keep items intersecting this set (possibly empty: keep nothing)
    AnyOf(HashSet<String>),
}

impl GenreMatcher {
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            GenreMatcher::Any => true,
            GenreMatcher::AnyOf(genres) => item.has_any_genre(genres),
        }
    }
}
