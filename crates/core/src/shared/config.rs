use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::infrastructure::index_factory::IndexBackend;
use crate::shared::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine tuning knobs.
///
/// Layered as defaults, then an optional JSON file, then environment
/// variables; the CLI applies its flags last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cosine similarity at or above which a face takes a gallery name.
    pub threshold: f32,
    pub det_threshold: f64,
    pub det_size: u32,
    pub embedding_dim: usize,
    pub throttle_ms: u64,
    /// ROI expansion as a fraction of `max(w, h)` of the previous box.
    pub roi_margin: f64,
    pub min_roi_side: i32,
    pub iou_keep: f64,
    pub miss_ttl: u32,
    /// Seconds without a frame after which a stream's tracker is dropped.
    pub stream_idle_secs: u64,
    /// Bound on one face model call in milliseconds; 0 waits forever.
    pub inference_timeout_ms: u64,
    pub gallery_path: PathBuf,
    /// Remote gallery export; empty disables remote sync.
    pub backend_gallery_url: String,
    pub remote_timeout_secs: u64,
    /// 0 disables the remote read cache.
    pub remote_cache_ttl_secs: u64,
    pub index_backend: IndexBackend,
    pub detector_model: Option<PathBuf>,
    pub embedding_model: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            det_threshold: DEFAULT_DET_THRESHOLD,
            det_size: DEFAULT_DET_SIZE,
            embedding_dim: EMBEDDING_DIM,
            throttle_ms: DEFAULT_THROTTLE_MS,
            roi_margin: DEFAULT_ROI_MARGIN,
            min_roi_side: MIN_ROI_SIDE,
            iou_keep: DEFAULT_IOU_KEEP,
            miss_ttl: DEFAULT_MISS_TTL,
            stream_idle_secs: DEFAULT_STREAM_IDLE_SECS,
            inference_timeout_ms: DEFAULT_INFERENCE_TIMEOUT_MS,
            gallery_path: PathBuf::from(DEFAULT_GALLERY_PATH),
            backend_gallery_url: DEFAULT_BACKEND_GALLERY_URL.to_string(),
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
            remote_cache_ttl_secs: 0,
            index_backend: IndexBackend::Auto,
            detector_model: None,
            embedding_model: None,
        }
    }
}

impl EngineConfig {
    /// `~/.config/Facewatch/config.json` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Facewatch").join("config.json"))
    }

    /// Platform data directory holding the ONNX models.
    pub fn model_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("Facewatch").join("models"))
    }

    /// Loads defaults, the JSON file at `path` (or the default location if it
    /// exists) and the process environment, then validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays values from `lookup` (normally the process environment).
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = &lookup;
        set_from(lookup, "THRESHOLD", &mut self.threshold);
        set_from(lookup, "DET_THRESHOLD", &mut self.det_threshold);
        set_from(lookup, "DET_SIZE", &mut self.det_size);
        set_from(lookup, "EMBEDDING_DIM", &mut self.embedding_dim);
        set_from(lookup, "FAST_THROTTLE_MS", &mut self.throttle_ms);
        set_from(lookup, "ROI_MARGIN", &mut self.roi_margin);
        set_from(lookup, "MIN_ROI_SIDE", &mut self.min_roi_side);
        set_from(lookup, "IOU_THRESH", &mut self.iou_keep);
        set_from(lookup, "MISS_TTL", &mut self.miss_ttl);
        set_from(lookup, "STREAM_IDLE_SECS", &mut self.stream_idle_secs);
        set_from(lookup, "INFERENCE_TIMEOUT_MS", &mut self.inference_timeout_ms);
        set_from(lookup, "GALLERY_PATH", &mut self.gallery_path);
        set_from(lookup, "BACKEND_GALLERY_EXPORT", &mut self.backend_gallery_url);
        set_from(lookup, "REMOTE_TIMEOUT_SECS", &mut self.remote_timeout_secs);
        set_from(lookup, "REMOTE_CACHE_TTL_SECS", &mut self.remote_cache_ttl_secs);
        set_from(lookup, "INDEX_BACKEND", &mut self.index_backend);
        if let Some(p) = lookup("DETECTOR_MODEL") {
            self.detector_model = Some(PathBuf::from(p));
        }
        if let Some(p) = lookup("EMBEDDING_MODEL") {
            self.embedding_model = Some(PathBuf::from(p));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be between -1.0 and 1.0, got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.det_threshold) {
            return Err(ConfigError::Invalid(format!(
                "det_threshold must be between 0.0 and 1.0, got {}",
                self.det_threshold
            )));
        }
        if self.det_size == 0 {
            return Err(ConfigError::Invalid("det_size must be positive".into()));
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::Invalid("embedding_dim must be positive".into()));
        }
        if !self.roi_margin.is_finite() || self.roi_margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "roi_margin must be non-negative, got {}",
                self.roi_margin
            )));
        }
        if self.min_roi_side < 1 {
            return Err(ConfigError::Invalid("min_roi_side must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.iou_keep) {
            return Err(ConfigError::Invalid(format!(
                "iou_keep must be between 0.0 and 1.0, got {}",
                self.iou_keep
            )));
        }
        if self.stream_idle_secs == 0 {
            return Err(ConfigError::Invalid(
                "stream_idle_secs must be positive".into(),
            ));
        }
        if self.remote_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "remote_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn detector_model_path(&self) -> Option<PathBuf> {
        self.detector_model
            .clone()
            .or_else(|| Self::model_dir().map(|d| d.join(DETECTOR_MODEL_NAME)))
    }

    pub fn embedding_model_path(&self) -> Option<PathBuf> {
        self.embedding_model
            .clone()
            .or_else(|| Self::model_dir().map(|d| d.join(EMBEDDING_MODEL_NAME)))
    }
}

fn set_from<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => log::warn!("Ignoring unparseable {key}={raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_match_service_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.threshold, 0.60);
        assert_eq!(c.throttle_ms, 250);
        assert_eq!(c.roi_margin, 0.25);
        assert_eq!(c.iou_keep, 0.30);
        assert_eq!(c.miss_ttl, 6);
        assert_eq!(c.embedding_dim, 512);
        assert_eq!(c.inference_timeout_ms, DEFAULT_INFERENCE_TIMEOUT_MS);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_apply_env_overrides_fields() {
        let vars = env(&[
            ("THRESHOLD", "0.45"),
            ("FAST_THROTTLE_MS", "100"),
            ("MISS_TTL", "3"),
            ("GALLERY_PATH", "/tmp/g.json"),
            ("INDEX_BACKEND", "brute"),
            ("INFERENCE_TIMEOUT_MS", "1500"),
            ("STREAM_IDLE_SECS", "60"),
        ]);
        let mut c = EngineConfig::default();
        c.apply_env(|k| vars.get(k).cloned());

        assert_eq!(c.threshold, 0.45);
        assert_eq!(c.throttle_ms, 100);
        assert_eq!(c.miss_ttl, 3);
        assert_eq!(c.gallery_path, PathBuf::from("/tmp/g.json"));
        assert_eq!(c.index_backend, IndexBackend::BruteForce);
        assert_eq!(c.inference_timeout_ms, 1500);
        assert_eq!(c.stream_idle_secs, 60);
    }

    #[test]
    fn test_apply_env_ignores_unparseable_values() {
        let vars = env(&[("THRESHOLD", "high"), ("MISS_TTL", "-1")]);
        let mut c = EngineConfig::default();
        c.apply_env(|k| vars.get(k).cloned());

        assert_eq!(c.threshold, DEFAULT_THRESHOLD);
        assert_eq!(c.miss_ttl, DEFAULT_MISS_TTL);
    }

    #[test]
    fn test_from_file_fills_missing_fields_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"threshold": 0.7, "index_backend": "matrix"}"#).unwrap();

        let c = EngineConfig::from_file(&path).unwrap();
        assert_eq!(c.threshold, 0.7);
        assert_eq!(c.index_backend, IndexBackend::Matrix);
        assert_eq!(c.throttle_ms, DEFAULT_THROTTLE_MS);
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let c = EngineConfig {
            threshold: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_negative_margin() {
        let c = EngineConfig {
            roi_margin: -0.1,
            ..EngineConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_explicit_model_path_wins() {
        let c = EngineConfig {
            detector_model: Some(PathBuf::from("/models/det.onnx")),
            ..EngineConfig::default()
        };
        assert_eq!(
            c.detector_model_path(),
            Some(PathBuf::from("/models/det.onnx"))
        );
    }
}
