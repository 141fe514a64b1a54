use std::time::Instant;

use crate::detection::domain::face_analyzer::AnalyzedFace;
use crate::fastpath::roi::{resolve_roi, PrevBox, Roi};
use crate::pipeline::engine::Engine;
use crate::pipeline::recognize_use_case::label_and_track;
use crate::pipeline::responses::RecognizeResponse;
use crate::shared::constants::DEFAULT_STREAM;
use crate::shared::error::RecognitionError;
use crate::shared::frame::Frame;

pub struct RecognizeFastRequest<'a> {
    pub image: &'a [u8],
    pub threshold: Option<f32>,
    /// Where the face was on the previous frame, if the caller knows.
    pub prev: PrevBox,
    pub stream: Option<&'a str>,
}

impl<'a> RecognizeFastRequest<'a> {
    pub fn new(image: &'a [u8]) -> Self {
        Self {
            image,
            threshold: None,
            prev: PrevBox::default(),
            stream: None,
        }
    }

    pub fn stream(&self) -> &str {
        self.stream.unwrap_or(DEFAULT_STREAM)
    }
}

/// Low-latency recognition of the primary face.
///
/// Searches around the previous box first and falls back to the full frame
/// when that finds nothing. Responses are throttled per stream: inside the
/// throttle window the last response is returned as-is and no detection
/// runs.
pub struct RecognizeFastUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> RecognizeFastUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self, request: &RecognizeFastRequest<'_>) -> RecognizeResponse {
        self.execute_at(request, Instant::now())
    }

    pub(crate) fn execute_at(
        &self,
        request: &RecognizeFastRequest<'_>,
        now: Instant,
    ) -> RecognizeResponse {
        // Not cached: the model can't appear mid-process.
        if let Err(e) = self.engine.analyzer() {
            return RecognizeResponse::failed(&e);
        }
        let (response, _) = self
            .engine
            .throttle()
            .get_or_compute(request.stream(), now, || {
                self.compute(request).unwrap_or_else(|e| {
                    log::debug!("Fast recognition failed: {e}");
                    RecognizeResponse::failed(&e)
                })
            });
        response
    }

    fn compute(
        &self,
        request: &RecognizeFastRequest<'_>,
    ) -> Result<RecognizeResponse, RecognitionError> {
        let frame = Frame::decode(request.image)?;
        let roi = resolve_roi(
            &request.prev,
            frame.width(),
            frame.height(),
            self.engine.config().roi_margin,
            self.engine.config().min_roi_side,
        );

        let primary: Vec<AnalyzedFace> = self.primary_face(&frame, roi)?.into_iter().collect();
        let threshold = self.engine.threshold(request.threshold);
        let detections = label_and_track(self.engine, request.stream(), &primary, threshold)?;
        Ok(RecognizeResponse {
            detections,
            reason: None,
        })
    }

    /// Highest-scoring face, in full-frame coordinates.
    fn primary_face(
        &self,
        frame: &Frame,
        roi: Option<Roi>,
    ) -> Result<Option<AnalyzedFace>, RecognitionError> {
        if let Some(roi) = roi {
            let crop = frame.crop(&roi.as_bbox());
            match self.engine.analyze(&crop) {
                Ok(faces) => {
                    if let Some(mut face) = faces.into_iter().next() {
                        face.bbox = face.bbox.translate(roi.x1, roi.y1);
                        return Ok(Some(face));
                    }
                    log::debug!("No face inside ROI {roi:?}, retrying full frame");
                }
                Err(e) => log::debug!("ROI inference failed, retrying full frame: {e}"),
            }
        }
        Ok(self.engine.analyze(frame)?.into_iter().next())
    }
}
