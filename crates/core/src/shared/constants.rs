pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";

/// ArcFace output length.
pub const EMBEDDING_DIM: usize = 512;

pub const DEFAULT_THRESHOLD: f32 = 0.60;
pub const DEFAULT_DET_THRESHOLD: f64 = 0.38;
pub const DEFAULT_DET_SIZE: u32 = 320;

pub const DEFAULT_THROTTLE_MS: u64 = 250;
pub const DEFAULT_ROI_MARGIN: f64 = 0.25;
/// Smallest ROI side (pixels) worth running detection on.
pub const MIN_ROI_SIDE: i32 = 10;

/// Streams with no frame for this long lose their tracker.
pub const DEFAULT_STREAM_IDLE_SECS: u64 = 300;

/// Upper bound on one face model call; 0 disables the bound.
pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_IOU_KEEP: f64 = 0.30;
/// Frames a track may go unmatched before it expires.
pub const DEFAULT_MISS_TTL: u32 = 6;

pub const DEFAULT_GALLERY_PATH: &str = "gallery.json";
pub const DEFAULT_BACKEND_GALLERY_URL: &str = "http://127.0.0.1:4000/cv/gallery/export";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 6;

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const DEFAULT_STREAM: &str = "default";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
