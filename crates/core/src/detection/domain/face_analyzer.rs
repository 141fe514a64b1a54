use crate::shared::bbox::BBox;
use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

/// One face found in a frame, with its identity embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzedFace {
    /// In the pixel space of the analyzed frame.
    pub bbox: BBox,
    pub score: f32,
    pub embedding: Embedding,
}

/// Domain interface for the detect-and-embed model.
///
/// Returns faces ordered by detection score, highest first; the first face
/// is the primary face for single-face operations. Implementations must be
/// shareable across request threads.
pub trait FaceAnalyzer: Send + Sync {
    fn analyze(&self, frame: &Frame) -> Result<Vec<AnalyzedFace>, Box<dyn std::error::Error>>;

    /// Length of the embeddings this analyzer produces.
    fn embedding_dim(&self) -> usize;

    /// Square detector input size, for status reporting.
    fn input_size(&self) -> Option<u32> {
        None
    }
}
