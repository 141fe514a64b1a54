use serde::Serialize;

use crate::shared::bbox::BBox;
use crate::shared::error::RecognitionError;

/// One labeled face in a recognition response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResponse {
    pub bbox: BBox,
    pub name: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecognizeResponse {
    pub detections: Vec<DetectionResponse>,
    /// Why the list is empty when the request could not be served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RecognizeResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(err: &RecognitionError) -> Self {
        Self {
            detections: Vec::new(),
            reason: Some(err.reason()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmbedResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EmbedResponse {
    pub fn failed(err: &RecognitionError) -> Self {
        Self {
            ok: false,
            embedding: None,
            bbox: None,
            reason: Some(err.reason()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrollResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Samples that contributed to the centroid.
    pub samples: usize,
    /// Gallery size after the operation.
    pub people: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EnrollResponse {
    pub fn failed(err: &RecognitionError, people: usize) -> Self {
        Self {
            ok: false,
            id: None,
            name: None,
            samples: 0,
            people,
            reason: Some(err.reason()),
        }
    }
}

/// Where the gallery came from after a sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    Backend,
    LocalFallback,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncResponse {
    pub ok: bool,
    pub count: usize,
    pub source: SyncSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Model loaded and at least one identity enrolled.
    Ready,
    /// Exactly one of the two.
    Degraded,
    NotReady,
}

impl Readiness {
    pub fn from_parts(model_loaded: bool, has_people: bool) -> Self {
        match (model_loaded, has_people) {
            (true, true) => Readiness::Ready,
            (false, false) => Readiness::NotReady,
            _ => Readiness::Degraded,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub people: usize,
    pub index_ready: bool,
    pub index_backend: &'static str,
    pub threshold: f32,
    pub det_threshold: f64,
    pub det_size: u32,
    pub backend_gallery: String,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
    pub readiness: Readiness,
}
