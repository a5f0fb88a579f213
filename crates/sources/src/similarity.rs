//! Neighbor similarity search.
//!
//! Cosine similarity between a query vector and every row of the
//! interaction matrix, then the k best rows. This is the expensive part of
//! a collaborative request (users x items per query), so rows are scanned
//! in blocks spread over the rayon pool, and the request budget is checked
//! before each block starts.

use crate::error::Result;
use crate::matrix::{InteractionMatrix, QueryVector, dot};
use crate::types::Budget;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Rows per scan block
pub const DEFAULT_BLOCK_ROWS: usize = 256;

/// A matrix row and how similar it is to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub similarity: f32,
}

/// Cosine similarity, defined as 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    cosine_from_parts(dot(a, b), norm_a, norm_b)
}

fn cosine_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Highest similarity first, lower row index first on ties
fn neighbor_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.row.cmp(&b.row))
}

/// Finds the rows of an [`InteractionMatrix`] closest to a query
#[derive(Debug, Clone)]
pub struct NeighborSearch {
    matrix: Arc<InteractionMatrix>,
    block_rows: usize,
}

impl NeighborSearch {
    pub fn new(matrix: Arc<InteractionMatrix>) -> Self {
        Self {
            matrix,
            block_rows: DEFAULT_BLOCK_ROWS,
        }
    }

    /// Configure rows per scan block (default: 256, minimum 1)
    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows.max(1);
        self
    }

    pub fn matrix(&self) -> &Arc<InteractionMatrix> {
        &self.matrix
    }

    /// Similarity of the query to every row, in row order
    pub fn similarities(&self, query: &QueryVector, budget: &Budget) -> Result<Vec<f32>> {
        let width = self.matrix.num_columns();
        let query_values = query.values();
        let query_norm = query.norm();

        // A zero query is dissimilar to everyone, no need to scan
        if query_norm == 0.0 {
            return Ok(vec![0.0; self.matrix.num_rows()]);
        }

        let blocks: Vec<Vec<f32>> = self
            .matrix
            .values()
            .par_chunks(width * self.block_rows)
            .zip(self.matrix.row_norms().par_chunks(self.block_rows))
            .map(|(block, norms)| -> Result<Vec<f32>> {
                budget.check()?;
                Ok(block
                    .chunks_exact(width)
                    .zip(norms)
                    .map(|(row, &row_norm)| {
                        cosine_from_parts(dot(query_values, row), query_norm, row_norm)
                    })
                    .collect::<Vec<f32>>())
            })
            .collect::<Result<Vec<Vec<f32>>>>()?;

        Ok(blocks.concat())
    }

    /// The `k` most similar rows, sorted by similarity descending.
    ///
    /// Returns `min(k, rows)` neighbors; ties resolve to the lower row index.
    #[instrument(skip(self, query, budget), fields(matched = query.matched()))]
    pub fn find_neighbors(
        &self,
        query: &QueryVector,
        k: usize,
        budget: &Budget,
    ) -> Result<Vec<Neighbor>> {
        let similarities = self.similarities(query, budget)?;
        let neighbors = select_top_k(similarities, k);
        debug!(
            "Selected {} neighbors (best similarity {:?})",
            neighbors.len(),
            neighbors.first().map(|n| n.similarity)
        );
        Ok(neighbors)
    }
}

fn select_top_k(similarities: Vec<f32>, k: usize) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = similarities
        .into_iter()
        .enumerate()
        .map(|(row, similarity)| Neighbor { row, similarity })
        .collect();

    let k = k.min(neighbors.len());
    if k == 0 {
        return Vec::new();
    }
    if k < neighbors.len() {
        neighbors.select_nth_unstable_by(k - 1, neighbor_order);
        neighbors.truncate(k);
    }
    neighbors.sort_unstable_by(neighbor_order);
    neighbors
}
