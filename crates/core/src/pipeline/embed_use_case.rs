use crate::pipeline::engine::Engine;
use crate::pipeline::responses::EmbedResponse;
use crate::shared::error::RecognitionError;
use crate::shared::frame::Frame;

/// Unit-norm embedding and box of the primary face in one image.
pub struct EmbedUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> EmbedUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self, image: &[u8]) -> EmbedResponse {
        match self.run(image) {
            Ok(response) => response,
            Err(e) => EmbedResponse::failed(&e),
        }
    }

    fn run(&self, image: &[u8]) -> Result<EmbedResponse, RecognitionError> {
        self.engine.analyzer()?;
        let frame = Frame::decode(image)?;
        let face = self
            .engine
            .analyze(&frame)?
            .into_iter()
            .next()
            .ok_or(RecognitionError::NoFaceDetected)?;
        Ok(EmbedResponse {
            ok: true,
            embedding: Some(face.embedding.into_vec()),
            bbox: Some(face.bbox),
            reason: None,
        })
    }
}
