/// Gallery held as one contiguous M×D matrix; a query batch is scored with a
/// single matrix product.
use ndarray::{Array2, ArrayView2};

use crate::gallery::domain::identity::Identity;
use crate::search::domain::similarity_index::{
    check_query_dim, top_k, SearchResult, SimilarityIndex,
};
use crate::shared::error::RecognitionError;

pub struct MatrixIndex {
    dim: usize,
    gallery: Array2<f32>,
}

impl MatrixIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            gallery: Array2::zeros((0, dim)),
        }
    }
}

impl SimilarityIndex for MatrixIndex {
    fn rebuild(&mut self, identities: &[Identity]) {
        let mut gallery = Array2::<f32>::zeros((identities.len(), self.dim));
        for (row, person) in identities.iter().enumerate() {
            for (col, v) in person.embedding.as_slice().iter().take(self.dim).enumerate() {
                gallery[[row, col]] = *v;
            }
        }
        self.gallery = gallery;
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
        let sims = queries.dot(&self.gallery.t());
        let rows = sims
            .rows()
            .into_iter()
            .map(|row| top_k(row.iter().copied(), k))
            .collect();
        Ok(SearchResult::from_rows(rows, k))
    }

    fn len(&self) -> usize {
        self.gallery.nrows()
    }

    fn backend(&self) -> &'static str {
        "matrix"
    }
}
