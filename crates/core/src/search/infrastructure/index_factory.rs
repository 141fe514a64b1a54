use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::search::domain::similarity_index::SimilarityIndex;

use super::brute_force_index::BruteForceIndex;
use super::matrix_index::MatrixIndex;

/// Similarity backend preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexBackend {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "matrix")]
    Matrix,
    #[serde(rename = "brute")]
    BruteForce,
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(IndexBackend::Auto),
            "matrix" => Ok(IndexBackend::Matrix),
            "brute" | "brute_force" => Ok(IndexBackend::BruteForce),
            other => Err(format!(
                "index backend must be one of: auto, matrix, brute, got '{other}'"
            )),
        }
    }
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Auto => write!(f, "auto"),
            IndexBackend::Matrix => write!(f, "matrix"),
            IndexBackend::BruteForce => write!(f, "brute"),
        }
    }
}

/// Creates the similarity index once at startup.
///
/// `Auto` uses the matrix index; brute force must be asked for. Logs which
/// backend is selected.
pub fn create_index(backend: IndexBackend, dim: usize) -> Box<dyn SimilarityIndex> {
    if backend != IndexBackend::BruteForce {
        log::info!("Using matrix similarity index (dim={dim})");
        Box::new(MatrixIndex::new(dim))
    } else {
        log::info!("Using brute-force similarity index (dim={dim})");
        Box::new(BruteForceIndex::new(dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::identity::Identity;
    use crate::search::domain::similarity_index::embedding_matrix;
    use crate::shared::embedding::Embedding;
    use crate::shared::error::RecognitionError;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const DIM: usize = 4;

    fn basis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    fn gallery() -> Vec<Identity> {
        vec![
            Identity::new("p_0", "Alice", "", basis(0)),
            Identity::new("p_1", "Bob", "", basis(1)),
            Identity::new("p_2", "Carol", "", vec![1.0, 1.0, 0.0, 0.0]),
        ]
    }

    fn built(backend: IndexBackend) -> Box<dyn SimilarityIndex> {
        let mut index = create_index(backend, DIM);
        index.rebuild(&gallery());
        index
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_stored_vector_is_its_own_top_match(#[case] backend: IndexBackend) {
        let index = built(backend);
        let people = gallery();
        for (i, person) in people.iter().enumerate() {
            let q = embedding_matrix(&[person.embedding.clone()]).unwrap();
            let result = index.search(q.view(), 1).unwrap();
            let (sim, idx) = result.top1(0).unwrap();
            assert_eq!(idx, i);
            assert_relative_eq!(sim, 1.0, epsilon = 1e-5);
        }
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_rows_sorted_descending(#[case] backend: IndexBackend) {
        let index = built(backend);
        let q = embedding_matrix(&[Embedding::new(basis(0))]).unwrap();
        let result = index.search(q.view(), 3).unwrap();

        assert_eq!(result.indices.row(0).to_vec(), vec![0, 2, 1]);
        let sims = result.similarities.row(0).to_vec();
        assert_relative_eq!(sims[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(sims[1], std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(sims[2], 0.0, epsilon = 1e-5);
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_k_capped_at_gallery_size(#[case] backend: IndexBackend) {
        let index = built(backend);
        let q = embedding_matrix(&[Embedding::new(basis(3))]).unwrap();
        let result = index.search(q.view(), 10).unwrap();
        assert_eq!(result.similarities.shape(), &[1, 3]);
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_ties_break_toward_lower_position(#[case] backend: IndexBackend) {
        // basis(3) is orthogonal to Alice and Bob alike.
        let index = built(backend);
        let q = embedding_matrix(&[Embedding::new(basis(3))]).unwrap();
        let result = index.search(q.view(), 1).unwrap();
        assert_eq!(result.top1(0).unwrap().1, 0);
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_batch_queries(#[case] backend: IndexBackend) {
        let index = built(backend);
        let q = embedding_matrix(&[Embedding::new(basis(1)), Embedding::new(basis(0))]).unwrap();
        let result = index.search(q.view(), 1).unwrap();
        assert_eq!(result.top1(0).unwrap().1, 1);
        assert_eq!(result.top1(1).unwrap().1, 0);
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_empty_gallery_fails_with_no_identities(#[case] backend: IndexBackend) {
        let index = create_index(backend, DIM);
        let q = embedding_matrix(&[Embedding::new(basis(0))]).unwrap();
        assert_eq!(
            index.search(q.view(), 1).unwrap_err(),
            RecognitionError::NoIdentitiesEnrolled
        );
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_query_dimension_mismatch(#[case] backend: IndexBackend) {
        let index = built(backend);
        let q = embedding_matrix(&[Embedding::new(vec![1.0, 0.0])]).unwrap();
        assert!(matches!(
            index.search(q.view(), 1),
            Err(RecognitionError::DimensionMismatch { .. })
        ));
    }

    #[rstest]
    #[case(IndexBackend::Matrix)]
    #[case(IndexBackend::BruteForce)]
    fn test_rebuild_replaces_contents(#[case] backend: IndexBackend) {
        let mut index = built(backend);
        index.rebuild(&[Identity::new("p_9", "Dave", "", basis(3))]);
        assert_eq!(index.len(), 1);
        let q = embedding_matrix(&[Embedding::new(basis(3))]).unwrap();
        assert_relative_eq!(
            index.search(q.view(), 1).unwrap().top1(0).unwrap().0,
            1.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_backends_agree_on_random_like_vectors() {
        let people: Vec<Identity> = (0..5)
            .map(|i| {
                let v: Vec<f32> = (0..DIM).map(|d| ((i * 7 + d * 3) % 11) as f32 - 5.0).collect();
                Identity::new(format!("p_{i}"), format!("n{i}"), "", v)
            })
            .collect();
        let mut matrix = create_index(IndexBackend::Matrix, DIM);
        let mut brute = create_index(IndexBackend::BruteForce, DIM);
        matrix.rebuild(&people);
        brute.rebuild(&people);

        let q = embedding_matrix(&[Embedding::new(vec![0.3, -0.2, 0.8, 0.1])]).unwrap();
        let a = matrix.search(q.view(), 5).unwrap();
        let b = brute.search(q.view(), 5).unwrap();
        assert_eq!(a.indices, b.indices);
        for (x, y) in a.similarities.iter().zip(b.similarities.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-5);
        }
    }

    #[rstest]
    #[case(IndexBackend::Auto, "matrix")]
    #[case(IndexBackend::Matrix, "matrix")]
    #[case(IndexBackend::BruteForce, "brute")]
    fn test_backend_selection(#[case] backend: IndexBackend, #[case] expected: &str) {
        assert_eq!(create_index(backend, DIM).backend(), expected);
    }

    #[test]
    fn test_parse_backend_names() {
        assert_eq!("AUTO".parse::<IndexBackend>().unwrap(), IndexBackend::Auto);
        assert_eq!("brute".parse::<IndexBackend>().unwrap(), IndexBackend::BruteForce);
        assert!("faiss".parse::<IndexBackend>().is_err());
    }
}
