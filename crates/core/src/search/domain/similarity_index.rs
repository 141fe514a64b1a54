use ndarray::{Array2, ArrayView2};

use crate::gallery::domain::identity::Identity;
use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;

/// Nearest-neighbour lookup over the gallery embeddings.
///
/// Similarity is the inner product of unit vectors (cosine), so every
/// implementation must return the same values and ordering for the same
/// gallery: rows sorted by descending similarity, ties broken by the lower
/// gallery position.
pub trait SimilarityIndex: Send + Sync {
    /// Replaces the indexed vectors with those of `identities`, in order.
    fn rebuild(&mut self, identities: &[Identity]);

    /// Top-`k` matches for each row of `queries` (N×D). `k` is capped at the
    /// gallery size.
    fn search(&self, queries: ArrayView2<'_, f32>, k: usize)
        -> Result<SearchResult, RecognitionError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short backend name for status reporting.
    fn backend(&self) -> &'static str;
}

/// N×k similarities and the gallery positions they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub similarities: Array2<f32>,
    pub indices: Array2<usize>,
}

impl SearchResult {
    pub(crate) fn from_rows(rows: Vec<Vec<(f32, usize)>>, k: usize) -> Self {
        let n = rows.len();
        let mut similarities = Array2::<f32>::zeros((n, k));
        let mut indices = Array2::<usize>::zeros((n, k));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, (sim, idx)) in row.into_iter().enumerate() {
                similarities[[r, c]] = sim;
                indices[[r, c]] = idx;
            }
        }
        Self {
            similarities,
            indices,
        }
    }

    /// Best match of query `row`, if any column exists.
    pub fn top1(&self, row: usize) -> Option<(f32, usize)> {
        if self.similarities.ncols() == 0 {
            return None;
        }
        Some((self.similarities[[row, 0]], self.indices[[row, 0]]))
    }
}

/// Keeps the `k` best `(similarity, position)` pairs, descending, lower
/// position first on ties.
pub(crate) fn top_k(scores: impl Iterator<Item = f32>, k: usize) -> Vec<(f32, usize)> {
    let mut ranked: Vec<(f32, usize)> = scores.enumerate().map(|(i, s)| (s, i)).collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.truncate(k);
    ranked
}

pub(crate) fn check_query_dim(
    queries: &ArrayView2<'_, f32>,
    expected: usize,
) -> Result<(), RecognitionError> {
    if queries.ncols() != expected {
        return Err(RecognitionError::DimensionMismatch {
            expected,
            found: queries.ncols(),
        });
    }
    Ok(())
}

/// Stacks embeddings into an N×D query matrix.
pub fn embedding_matrix(embeddings: &[Embedding]) -> Result<Array2<f32>, RecognitionError> {
    let dim = embeddings.first().map_or(0, Embedding::dim);
    if let Some(bad) = embeddings.iter().find(|e| e.dim() != dim) {
        return Err(RecognitionError::DimensionMismatch {
            expected: dim,
            found: bad.dim(),
        });
    }
    let flat: Vec<f32> = embeddings
        .iter()
        .flat_map(|e| e.as_slice().iter().copied())
        .collect();
    Array2::from_shape_vec((embeddings.len(), dim), flat)
        .map_err(|e| RecognitionError::Inference(e.to_string()))
}
