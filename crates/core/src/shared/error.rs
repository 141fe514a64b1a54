use thiserror::Error;

/// Per-request failure kinds of the recognition engine.
///
/// All of them are recoverable: use cases turn them into response values
/// rather than letting them escape as process faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("face model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("decode_error: {0}")]
    Decode(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("no face detected in enrollment sample {index}")]
    NoFaceInSample { index: usize },
    #[error("enrollment needs {required} samples with a face, found {found}")]
    InsufficientSamples { required: usize, found: usize },
    #[error("no identities enrolled")]
    NoIdentitiesEnrolled,
    #[error("embedding dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid ROI hint: {0}")]
    InvalidRoi(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RecognitionError {
    /// Short machine-readable reason carried in degraded responses.
    pub fn reason(&self) -> String {
        match self {
            RecognitionError::ModelUnavailable(_) => "model_not_initialized".to_string(),
            RecognitionError::NoFaceDetected | RecognitionError::NoFaceInSample { .. } => {
                "no_face".to_string()
            }
            other => other.to_string(),
        }
    }
}
