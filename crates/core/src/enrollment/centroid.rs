use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;

/// How many enrollment samples must contain a face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SamplePolicy {
    /// Any sample without a face aborts the enrollment.
    #[default]
    RequireAll,
    /// Faceless samples are skipped as long as this many remain.
    AtLeast(usize),
}

/// Applies `policy` to per-sample outcomes (`None` = no face found) and
/// returns the usable embeddings in sample order.
pub fn select_samples(
    outcomes: Vec<Option<Embedding>>,
    policy: SamplePolicy,
) -> Result<Vec<Embedding>, RecognitionError> {
    let total = outcomes.len();
    let required = match policy {
        SamplePolicy::RequireAll => {
            if let Some(index) = outcomes.iter().position(Option::is_none) {
                return Err(RecognitionError::NoFaceInSample { index });
            }
            total
        }
        SamplePolicy::AtLeast(n) => n,
    };

    let selected: Vec<Embedding> = outcomes.into_iter().flatten().collect();
    if selected.is_empty() || selected.len() < required {
        return Err(RecognitionError::InsufficientSamples {
            required: required.max(1),
            found: selected.len(),
        });
    }
    if selected.len() < total {
        log::debug!(
            "Enrolling from {} of {total} samples ({} without a face)",
            selected.len(),
            total - selected.len()
        );
    }
    Ok(selected)
}

/// Mean of the sample embeddings, renormalized to unit length.
pub fn centroid(samples: &[Embedding]) -> Result<Embedding, RecognitionError> {
    let Some(first) = samples.first() else {
        return Err(RecognitionError::InsufficientSamples {
            required: 1,
            found: 0,
        });
    };
    let dim = first.dim();
    let mut sum = vec![0.0f64; dim];
    for sample in samples {
        if sample.dim() != dim {
            return Err(RecognitionError::DimensionMismatch {
                expected: dim,
                found: sample.dim(),
            });
        }
        for (acc, v) in sum.iter_mut().zip(sample.as_slice()) {
            *acc += *v as f64;
        }
    }
    let n = samples.len() as f64;
    Ok(Embedding::new(
        sum.into_iter().map(|s| (s / n) as f32).collect(),
    ))
}
