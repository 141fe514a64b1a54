/// Scores each query against each gallery vector one dot product at a time.
///
/// Fallback when the matrix backend is disabled; observable results are
/// identical.
use ndarray::ArrayView2;

use crate::gallery::domain::identity::Identity;
use crate::search::domain::similarity_index::{
    check_query_dim, top_k, SearchResult, SimilarityIndex,
};
use crate::shared::embedding::{dot, Embedding};
use crate::shared::error::RecognitionError;

pub struct BruteForceIndex {
    dim: usize,
    vectors: Vec<Embedding>,
}

impl BruteForceIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }
}

impl SimilarityIndex for BruteForceIndex {
    fn rebuild(&mut self, identities: &[Identity]) {
        self.vectors = identities.iter().map(|p| p.embedding.clone()).collect();
    }

    fn search(
        &self,
        queries: ArrayView2<'_, f32>,
        k: usize,
    ) -> Result<SearchResult, RecognitionError> {
        if self.is_empty() {
            return Err(RecognitionError::NoIdentitiesEnrolled);
        }
        check_query_dim(&queries, self.dim)?;

        let k = k.min(self.len());
        let rows = queries
            .rows()
            .into_iter()
            .map(|q| {
                let q = q.to_vec();
                top_k(self.vectors.iter().map(|v| dot(&q, v.as_slice())), k)
            })
            .collect();
        Ok(SearchResult::from_rows(rows, k))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn backend(&self) -> &'static str {
        "brute"
    }
}
