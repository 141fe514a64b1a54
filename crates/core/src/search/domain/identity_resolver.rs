use crate::gallery::domain::identity::Identity;
use crate::search::domain::similarity_index::{embedding_matrix, SimilarityIndex};
use crate::shared::constants::UNKNOWN_LABEL;
use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;

/// Label assigned to one query embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub label: String,
    /// Top-1 similarity, reported even when below the threshold.
    pub confidence: f32,
}

impl Resolution {
    pub fn unknown(confidence: f32) -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            confidence,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Resolves each embedding to the name of its nearest identity when the
/// similarity reaches `threshold`, otherwise to "Unknown".
///
/// `identities` must be the list `index` was built from. An empty gallery
/// resolves every row to `("Unknown", 0.0)`.
pub fn resolve(
    index: &dyn SimilarityIndex,
    identities: &[Identity],
    embeddings: &[Embedding],
    threshold: f32,
) -> Result<Vec<Resolution>, RecognitionError> {
    if embeddings.is_empty() {
        return Ok(Vec::new());
    }
    let queries = embedding_matrix(embeddings)?;
    let result = match index.search(queries.view(), 1) {
        Ok(result) => result,
        Err(RecognitionError::NoIdentitiesEnrolled) => {
            return Ok(vec![Resolution::unknown(0.0); embeddings.len()]);
        }
        Err(e) => return Err(e),
    };

    Ok((0..embeddings.len())
        .map(|row| match result.top1(row) {
            Some((sim, idx)) if sim >= threshold => Resolution {
                label: identities
                    .get(idx)
                    .map_or_else(|| UNKNOWN_LABEL.to_string(), |p| p.name.clone()),
                confidence: sim,
            },
            Some((sim, _)) => Resolution::unknown(sim),
            None => Resolution::unknown(0.0),
        })
        .collect())
}
