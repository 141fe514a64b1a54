use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::detection::domain::face_analyzer::{AnalyzedFace, FaceAnalyzer};
use crate::detection::infrastructure::onnx_face_analyzer::OnnxFaceAnalyzer;
use crate::fastpath::throttle::ThrottleCache;
use crate::gallery::domain::gallery_source::GallerySource;
use crate::gallery::domain::gallery_store::GalleryStore;
use crate::gallery::domain::snapshot_store::SnapshotStore;
use crate::gallery::infrastructure::cached_gallery_source::CachedGallerySource;
use crate::gallery::infrastructure::http_gallery_source::HttpGallerySource;
use crate::gallery::infrastructure::json_snapshot_store::JsonSnapshotStore;
use crate::pipeline::responses::{RecognizeResponse, SyncResponse};
use crate::pipeline::sync_gallery_use_case::SyncGalleryUseCase;
use crate::search::infrastructure::index_factory::create_index;
use crate::shared::config::EngineConfig;
use crate::shared::error::RecognitionError;
use crate::shared::frame::Frame;
use crate::tracking::stream_trackers::StreamTrackers;

/// The face model, or why it could not be loaded.
pub enum ModelState {
    Loaded(Arc<dyn FaceAnalyzer>),
    Unavailable(String),
}

/// All mutable recognition state, owned in one place and shared by
/// reference with every use case.
///
/// Lifecycle: construct, `init` (gallery from remote or snapshot), serve
/// requests from any number of threads, `teardown` (persist).
pub struct Engine {
    config: EngineConfig,
    model: ModelState,
    gallery: RwLock<GalleryStore>,
    source: Option<Box<dyn GallerySource>>,
    trackers: StreamTrackers,
    throttle: ThrottleCache<RecognizeResponse>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        model: ModelState,
        snapshot: Box<dyn SnapshotStore>,
        source: Option<Box<dyn GallerySource>>,
    ) -> Self {
        let index = create_index(config.index_backend, config.embedding_dim);
        let gallery = GalleryStore::new(index, snapshot, config.embedding_dim);
        Self {
            trackers: StreamTrackers::new(
                config.iou_keep,
                config.miss_ttl,
                Duration::from_secs(config.stream_idle_secs),
            ),
            throttle: ThrottleCache::new(Duration::from_millis(config.throttle_ms)),
            gallery: RwLock::new(gallery),
            model,
            source,
            config,
        }
    }

    /// Wires the production adapters: ONNX models, JSON snapshot at
    /// `gallery_path` and the HTTP gallery export. A model that fails to
    /// load leaves the engine up in a degraded state.
    pub fn from_config(config: EngineConfig) -> Self {
        let model = load_model(&config);
        let snapshot = Box::new(JsonSnapshotStore::new(config.gallery_path.clone()));
        let source = remote_source(&config);
        Self::new(config, model, snapshot, source)
    }

    /// Loads the gallery: remote first, local snapshot on failure.
    pub fn init(&self) -> SyncResponse {
        let response = SyncGalleryUseCase::new(self).execute();
        log::info!(
            "Engine ready: {} identities ({:?}), model {}",
            response.count,
            response.source,
            if self.model_loaded() { "loaded" } else { "unavailable" }
        );
        response
    }

    /// Best-effort persist of the gallery if it changed since it was loaded
    /// or last saved.
    pub fn teardown(&self) -> bool {
        let gallery = self.gallery();
        if !gallery.is_dirty() {
            log::debug!("Gallery unchanged, snapshot left as is");
            return true;
        }
        gallery.persist()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_loaded(&self) -> bool {
        matches!(self.model, ModelState::Loaded(_))
    }

    pub fn model_error(&self) -> Option<&str> {
        match &self.model {
            ModelState::Loaded(_) => None,
            ModelState::Unavailable(reason) => Some(reason.as_str()),
        }
    }

    pub fn analyzer(&self) -> Result<&dyn FaceAnalyzer, RecognitionError> {
        match &self.model {
            ModelState::Loaded(analyzer) => Ok(analyzer.as_ref()),
            ModelState::Unavailable(reason) => {
                Err(RecognitionError::ModelUnavailable(reason.clone()))
            }
        }
    }

    /// Runs the face model on `frame`, primary face first.
    ///
    /// With a non-zero `inference_timeout_ms` the call runs on a worker
    /// thread and is abandoned once the bound passes; the worker finishes in
    /// the background and its result is dropped.
    pub fn analyze(&self, frame: &Frame) -> Result<Vec<AnalyzedFace>, RecognitionError> {
        let analyzer = match &self.model {
            ModelState::Loaded(analyzer) => Arc::clone(analyzer),
            ModelState::Unavailable(reason) => {
                return Err(RecognitionError::ModelUnavailable(reason.clone()))
            }
        };
        let timeout_ms = self.config.inference_timeout_ms;
        if timeout_ms == 0 {
            return analyzer
                .analyze(frame)
                .map_err(|e| RecognitionError::Inference(e.to_string()));
        }

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let frame = frame.clone();
        thread::Builder::new()
            .name("face-inference".into())
            .spawn(move || {
                let result = analyzer.analyze(&frame).map_err(|e| e.to_string());
                let _ = result_tx.send(result);
            })
            .map_err(|e| RecognitionError::Inference(format!("failed to start inference: {e}")))?;

        match result_rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(result) => result.map_err(RecognitionError::Inference),
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Face model call exceeded {timeout_ms} ms");
                Err(RecognitionError::Inference(format!(
                    "timed out after {timeout_ms} ms"
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(RecognitionError::Inference(
                "inference worker exited without a result".into(),
            )),
        }
    }

    /// Request override when it is a finite number, configured value otherwise.
    pub fn threshold(&self, requested: Option<f32>) -> f32 {
        requested
            .filter(|t| t.is_finite())
            .unwrap_or(self.config.threshold)
    }

    /// Shared read access; many queries may hold this at once.
    pub fn gallery(&self) -> RwLockReadGuard<'_, GalleryStore> {
        self.gallery.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access spanning mutation and index rebuild.
    pub fn gallery_mut(&self) -> RwLockWriteGuard<'_, GalleryStore> {
        self.gallery.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn source(&self) -> Option<&dyn GallerySource> {
        self.source.as_deref()
    }

    pub fn trackers(&self) -> &StreamTrackers {
        &self.trackers
    }

    pub fn throttle(&self) -> &ThrottleCache<RecognizeResponse> {
        &self.throttle
    }
}

fn load_model(config: &EngineConfig) -> ModelState {
    let (Some(detector), Some(embedder)) =
        (config.detector_model_path(), config.embedding_model_path())
    else {
        log::warn!("No model directory on this platform; face endpoints disabled");
        return ModelState::Unavailable("no model directory".into());
    };
    match OnnxFaceAnalyzer::new(
        &detector,
        &embedder,
        config.det_threshold,
        config.det_size,
        config.embedding_dim,
    ) {
        Ok(analyzer) => ModelState::Loaded(Arc::new(analyzer)),
        Err(e) => {
            log::warn!("Failed to initialize face models; face endpoints disabled: {e}");
            ModelState::Unavailable(e.to_string())
        }
    }
}

fn remote_source(config: &EngineConfig) -> Option<Box<dyn GallerySource>> {
    if config.backend_gallery_url.is_empty() {
        return None;
    }
    let timeout = Duration::from_secs(config.remote_timeout_secs);
    let http = match HttpGallerySource::new(config.backend_gallery_url.clone(), timeout) {
        Ok(http) => http,
        Err(e) => {
            log::warn!("Remote gallery disabled: {e}");
            return None;
        }
    };
    if config.remote_cache_ttl_secs == 0 {
        return Some(Box::new(http));
    }
    Some(Box::new(CachedGallerySource::new(
        Box::new(http),
        Duration::from_secs(config.remote_cache_ttl_secs),
    )))
}
