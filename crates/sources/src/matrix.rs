//! Dense user x item rating matrix.
//!
//! Rows are users, columns are items, both in ascending id order and fixed
//! at construction. A stored `0.0` means "unrated". Valid ratings start at
//! 0.5, so a genuine zero rating cannot be represented; `rating()` surfaces
//! the unrated case as `None` instead of a bare zero.

use crate::error::{RecommendError, Result};
use crate::types::UserRatingQuery;
use data_loader::{Catalog, ItemId, RatingEvent, UserId};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Stored value for an unrated cell
pub const UNRATED: f32 = 0.0;

#[derive(Debug)]
pub struct InteractionMatrix {
    user_ids: Vec<UserId>,
    item_ids: Vec<ItemId>,
    user_rows: HashMap<UserId, usize>,
    item_columns: HashMap<ItemId, usize>,
    /// Row-major, `user_ids.len() * item_ids.len()`
    values: Vec<f32>,
    /// Euclidean norm of each row, computed once
    row_norms: Vec<f32>,
}

impl InteractionMatrix {
    pub fn from_catalog(catalog: &Catalog) -> Result<Self> {
        Self::from_ratings(catalog.ratings())
    }

    /// Build from raw events. When a (user, item) pair repeats, the event
    /// seen last wins.
    pub fn from_ratings(ratings: &[RatingEvent]) -> Result<Self> {
        if ratings.is_empty() {
            return Err(RecommendError::DataUnavailable(
                "cannot build an interaction matrix without ratings".to_string(),
            ));
        }

        let user_ids: Vec<UserId> = ratings
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let item_ids: Vec<ItemId> = ratings
            .iter()
            .map(|r| r.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_rows: HashMap<UserId, usize> =
            user_ids.iter().enumerate().map(|(row, &id)| (id, row)).collect();
        let item_columns: HashMap<ItemId, usize> =
            item_ids.iter().enumerate().map(|(col, &id)| (id, col)).collect();

        let num_columns = item_ids.len();
        let mut values = vec![UNRATED; user_ids.len() * num_columns];
        for rating in ratings {
            // Both ids were collected from this same slice
            let row = user_rows[&rating.user_id];
            let col = item_columns[&rating.item_id];
            values[row * num_columns + col] = rating.rating;
        }

        let row_norms = values
            .par_chunks(num_columns)
            .map(norm)
            .collect();

        info!(
            "Built interaction matrix: {} users x {} items",
            user_ids.len(),
            num_columns
        );

        Ok(Self {
            user_ids,
            item_ids,
            user_rows,
            item_columns,
            values,
            row_norms,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.user_ids.len()
    }

    pub fn num_columns(&self) -> usize {
        self.item_ids.len()
    }

    /// Row order
    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Column order
    pub fn item_ids(&self) -> &[ItemId] {
        &self.item_ids
    }

    pub fn row_of(&self, user_id: UserId) -> Option<usize> {
        self.user_rows.get(&user_id).copied()
    }

    pub fn column_of(&self, item_id: ItemId) -> Option<usize> {
        self.item_columns.get(&item_id).copied()
    }

    /// Raw row, zeros included
    pub fn row(&self, row: usize) -> &[f32] {
        let width = self.num_columns();
        &self.values[row * width..(row + 1) * width]
    }

    pub fn row_norm(&self, row: usize) -> f32 {
        self.row_norms[row]
    }

    /// Whole row-major buffer, used by batched scans
    pub(crate) fn values(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn row_norms(&self) -> &[f32] {
        &self.row_norms
    }

    /// `None` when the user or item is unknown or the cell is unrated
    pub fn rating(&self, user_id: UserId, item_id: ItemId) -> Option<f32> {
        let row = self.row_of(user_id)?;
        let col = self.column_of(item_id)?;
        let value = self.values[row * self.num_columns() + col];
        (value != UNRATED).then_some(value)
    }

    /// Align a sparse query to the column order. Items outside the matrix
    /// are skipped.
    pub fn query_vector(&self, query: &UserRatingQuery) -> QueryVector {
        let mut values = vec![UNRATED; self.num_columns()];
        let mut matched = 0;
        for (item_id, rating) in query.iter() {
            if let Some(col) = self.column_of(item_id) {
                values[col] = rating;
                matched += 1;
            }
        }
        QueryVector::new(values, matched)
    }

    /// Wrap an already dense vector, checking it matches the column count
    pub fn dense_query(&self, values: Vec<f32>) -> Result<QueryVector> {
        if values.len() != self.num_columns() {
            return Err(RecommendError::DimensionMismatch {
                expected: self.num_columns(),
                found: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RecommendError::InvalidArgument(
                "query vector contains non-finite values".to_string(),
            ));
        }
        let matched = values.iter().filter(|&&v| v != UNRATED).count();
        Ok(QueryVector::new(values, matched))
    }
}

/// Dense query aligned to an [`InteractionMatrix`]'s columns
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    values: Vec<f32>,
    norm: f32,
    matched: usize,
}

impl QueryVector {
    fn new(values: Vec<f32>, matched: usize) -> Self {
        let norm = norm(&values);
        Self {
            values,
            norm,
            matched,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn norm(&self) -> f32 {
        self.norm
    }

    /// Number of non-empty positions
    pub fn matched(&self) -> usize {
        self.matched
    }
}

/// Dot product with eight independent accumulators so the compiler can
/// keep the loop in SIMD registers.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    const LANES: usize = 8;

    let mut acc = [0.0f32; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    for (x, y) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            acc[lane] += x[lane] * y[lane];
        }
    }

    let tail: f32 = a_tail.iter().zip(b_tail).map(|(x, y)| x * y).sum();
    acc.iter().sum::<f32>() + tail
}

pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
