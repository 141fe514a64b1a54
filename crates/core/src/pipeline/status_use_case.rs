use crate::pipeline::engine::Engine;
use crate::pipeline::responses::{Readiness, StatusResponse};

/// Read-only health report: gallery size, index state, thresholds and
/// model availability.
pub struct StatusUseCase<'a> {
    engine: &'a Engine,
}

impl<'a> StatusUseCase<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn execute(&self) -> StatusResponse {
        let config = self.engine.config();
        let (people, index_len, index_backend) = {
            let gallery = self.engine.gallery();
            (gallery.len(), gallery.index_len(), gallery.index_backend())
        };
        let model_loaded = self.engine.model_loaded();
        let det_size = self
            .engine
            .analyzer()
            .ok()
            .and_then(|a| a.input_size())
            .unwrap_or(config.det_size);

        StatusResponse {
            ok: true,
            people,
            index_ready: people > 0 && index_len == people,
            index_backend,
            threshold: config.threshold,
            det_threshold: config.det_threshold,
            det_size,
            backend_gallery: self
                .engine
                .source()
                .map(|s| s.describe())
                .unwrap_or_default(),
            model_loaded,
            model_error: self.engine.model_error().map(str::to_string),
            readiness: Readiness::from_parts(model_loaded, people > 0),
        }
    }
}
