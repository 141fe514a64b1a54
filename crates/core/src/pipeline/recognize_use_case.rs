use std::time::Instant;

use crate::detection::domain::face_analyzer::AnalyzedFace;
use crate::pipeline::engine::Engine;
use crate::pipeline::responses::{DetectionResponse, RecognizeResponse};
use crate::shared::constants::DEFAULT_STREAM;
use crate::shared::embedding::Embedding;
use crate::shared::error::RecognitionError;
use crate::shared::frame::Frame;
use crate::tracking::iou_tracker::Detection;

pub struct RecognizeRequest<'a> {
    pub image: &'a [u8],
    /// Overrides the configured similarity threshold.
    pub threshold: Option<f32>,
    /// Tracker partition; `None` uses the default stream.
    pub stream: Option<&'a str>,
}

impl<'a> RecognizeRequest<'a> {
    pub fn new(image: &'a [u8]) -> Self {
        Self {
            image,
            threshold: None,
            stream: None,
        }
    }

    pub fn stream(&self) -> &str {
        self.stream.unwrap_or(DEFAULT_STREAM)
    }
}

/// Full-frame recognition: decode → analyze → resolve → track.
pub struct RecognizeUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> RecognizeUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Failures come back as an empty detection list with a `reason`.
    pub fn execute(&self, request: &RecognizeRequest<'_>) -> RecognizeResponse {
        self.run(request).unwrap_or_else(|e| {
            log::debug!("Recognition failed: {e}");
            RecognizeResponse::failed(&e)
        })
    }

    fn run(&self, request: &RecognizeRequest<'_>) -> Result<RecognizeResponse, RecognitionError> {
        self.engine.analyzer()?;
        let frame = Frame::decode(request.image)?;
        let faces = self.engine.analyze(&frame)?;
        let threshold = self.engine.threshold(request.threshold);
        let detections = label_and_track(self.engine, request.stream(), &faces, threshold)?;
        Ok(RecognizeResponse {
            detections,
            reason: None,
        })
    }
}

/// Resolves each face against the gallery and advances the stream's
/// tracker with the result. Runs the tracker even for zero faces so stale
/// tracks age out.
pub(crate) fn label_and_track(
    engine: &Engine,
    stream: &str,
    faces: &[AnalyzedFace],
    threshold: f32,
) -> Result<Vec<DetectionResponse>, RecognitionError> {
    let embeddings: Vec<Embedding> = faces.iter().map(|f| f.embedding.clone()).collect();
    let resolutions = engine.gallery().resolve(&embeddings, threshold)?;

    let detections: Vec<Detection> = faces
        .iter()
        .zip(resolutions)
        .map(|(face, resolution)| Detection {
            bbox: face.bbox,
            label: resolution.label,
            confidence: resolution.confidence,
        })
        .collect();
    let track_ids = engine
        .trackers()
        .update(stream, &detections, Instant::now());

    Ok(detections
        .into_iter()
        .zip(track_ids)
        .map(|(det, track_id)| DetectionResponse {
            bbox: det.bbox,
            name: det.label,
            confidence: det.confidence,
            track_id: Some(track_id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::domain::gallery_store::tests::MemorySnapshotStore;
    use crate::pipeline::engine::tests::{engine_with, enroll, face, png, StubAnalyzer};
    use crate::shared::bbox::BBox;
    use approx::assert_relative_eq;

    fn engine_seeing(faces: Vec<AnalyzedFace>) -> Engine {
        engine_with(
            Some(StubAnalyzer::with_faces(64, 48, faces)),
            MemorySnapshotStore::default(),
            None,
        )
    }

    #[test]
    fn test_known_face_is_named_with_full_confidence() {
        let engine = engine_seeing(vec![face(BBox::new(5, 5, 20, 20), [1.0, 0.0])]);
        enroll(&engine, "Alice", [1.0, 0.0]);

        let image = png(64, 48);
        let response = RecognizeUseCase::new(&engine).execute(&RecognizeRequest::new(&image));

        assert_eq!(response.reason, None);
        let det = &response.detections[0];
        assert_eq!(det.name, "Alice");
        assert_relative_eq!(det.confidence, 1.0, epsilon = 1e-5);
        assert_eq!(det.bbox, BBox::new(5, 5, 20, 20));
        assert_eq!(det.track_id, Some(1));
    }

    #[test]
    fn test_orthogonal_face_is_unknown_with_zero_confidence() {
        let engine = engine_seeing(vec![face(BBox::new(5, 5, 20, 20), [0.0, 1.0])]);
        enroll(&engine, "Alice", [1.0, 0.0]);

        let image = png(64, 48);
        let response = RecognizeUseCase::new(&engine).execute(&RecognizeRequest::new(&image));

        assert_eq!(response.detections[0].name, "Unknown");
        assert_relative_eq!(response.detections[0].confidence, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_threshold_override_applies() {
        // cos = 0.8
        let engine = engine_seeing(vec![face(BBox::new(5, 5, 20, 20), [0.8, 0.6])]);
        enroll(&engine, "Alice", [1.0, 0.0]);
        let image = png(64, 48);
        let use_case = RecognizeUseCase::new(&engine);

        let strict = use_case.execute(&RecognizeRequest {
            threshold: Some(0.9),
            ..RecognizeRequest::new(&image)
        });
        assert_eq!(strict.detections[0].name, "Unknown");
        assert_relative_eq!(strict.detections[0].confidence, 0.8, epsilon = 1e-5);

        let lenient = use_case.execute(&RecognizeRequest::new(&image));
        assert_eq!(lenient.detections[0].name, "Alice");
    }

    #[test]
    fn test_empty_gallery_labels_everything_unknown() {
        let engine = engine_seeing(vec![
            face(BBox::new(0, 0, 20, 20), [1.0, 0.0]),
            face(BBox::new(30, 0, 20, 20), [0.0, 1.0]),
        ]);
        let image = png(64, 48);
        let response = RecognizeUseCase::new(&engine).execute(&RecognizeRequest::new(&image));

        assert_eq!(response.detections.len(), 2);
        for det in &response.detections {
            assert_eq!(det.name, "Unknown");
            assert_eq!(det.confidence, 0.0);
        }
    }

    #[test]
    fn test_track_id_stable_across_requests() {
        let engine = engine_seeing(vec![face(BBox::new(5, 5, 20, 20), [1.0, 0.0])]);
        let image = png(64, 48);
        let use_case = RecognizeUseCase::new(&engine);

        let first = use_case.execute(&RecognizeRequest::new(&image));
        let second = use_case.execute(&RecognizeRequest::new(&image));
        assert_eq!(first.detections[0].track_id, second.detections[0].track_id);
    }

    #[test]
    fn test_streams_track_independently() {
        let engine = engine_seeing(vec![face(BBox::new(5, 5, 20, 20), [1.0, 0.0])]);
        let image = png(64, 48);
        let use_case = RecognizeUseCase::new(&engine);

        use_case.execute(&RecognizeRequest::new(&image));
        let other = use_case.execute(&RecognizeRequest {
            stream: Some("door"),
            ..RecognizeRequest::new(&image)
        });
        assert_eq!(other.detections[0].track_id, Some(1));
        assert_eq!(engine.trackers().stream_count(), 2);
    }

    #[test]
    fn test_frame_without_faces_still_ages_tracks() {
        let mut stub =
            StubAnalyzer::with_faces(64, 48, vec![face(BBox::new(5, 5, 20, 20), [1.0, 0.0])]);
        stub.faces_by_size.insert((32, 32), Vec::new());
        let engine = engine_with(Some(stub), MemorySnapshotStore::default(), None);
        let use_case = RecognizeUseCase::new(&engine);

        use_case.execute(&RecognizeRequest::new(&png(64, 48)));
        let miss_ttl = engine.config().miss_ttl;
        let empty = png(32, 32);
        for _ in 0..=miss_ttl {
            let response = use_case.execute(&RecognizeRequest::new(&empty));
            assert!(response.detections.is_empty());
            assert_eq!(response.reason, None);
        }
        assert_eq!(engine.trackers().live_tracks(DEFAULT_STREAM), 0);
    }

    #[test]
    fn test_model_unavailable_reason() {
        let engine = engine_with(None, MemorySnapshotStore::default(), None);
        let response =
            RecognizeUseCase::new(&engine).execute(&RecognizeRequest::new(b"irrelevant"));
        assert!(response.detections.is_empty());
        assert_eq!(response.reason.as_deref(), Some("model_not_initialized"));
    }

    #[test]
    fn test_undecodable_image_reason() {
        let engine = engine_seeing(Vec::new());
        let response = RecognizeUseCase::new(&engine).execute(&RecognizeRequest::new(b"garbage"));
        assert!(response
            .reason
            .as_deref()
            .is_some_and(|r| r.starts_with("decode_error: ")));
        assert_eq!(engine.trackers().stream_count(), 0);
    }
}
