/// Face analyzer over two ONNX Runtime sessions: a YOLO face detector and
/// an ArcFace embedder.
///
/// Detection handles letterbox preprocessing, inference and NMS; each kept
/// box is then cropped from the frame, resized to 112×112 and embedded.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_analyzer::{AnalyzedFace, FaceAnalyzer};
use crate::shared::bbox::BBox;
use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

use super::execution_provider::{accelerator_name, preferred_execution_providers};

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// ArcFace input resolution.
const EMBED_INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Letterbox fill, YOLO convention.
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxFaceAnalyzer {
    detector: Mutex<ort::session::Session>,
    embedder: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
    embedding_dim: usize,
}

impl OnnxFaceAnalyzer {
    /// Loads both models.
    ///
    /// The detector input resolution is read from the model's NCHW input
    /// shape; `det_size` is used when the shape is dynamic or unreadable.
    pub fn new(
        detector_path: &Path,
        embedder_path: &Path,
        confidence: f64,
        det_size: u32,
        embedding_dim: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = build_session(detector_path)?;
        let input_size = detector
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(det_size);
        let embedder = build_session(embedder_path)?;

        log::info!(
            "Loaded face models on {} (detector input {input_size}, confidence {confidence})",
            accelerator_name()
        );
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            confidence,
            input_size,
            embedding_dim,
        })
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let mut session = self
            .detector
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // [1, features, detections] (transposed) or [1, detections, features].
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let feat = |f: usize| {
                if transposed {
                    data[f * num_dets + i]
                } else {
                    data[i * num_feats + f]
                }
            };
            // [cx, cy, w, h, conf, keypoints...]
            if num_feats < 5 {
                continue;
            }
            let conf = feat(4) as f64;
            if conf < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (feat(0) as f64, feat(1) as f64, feat(2) as f64, feat(3) as f64);
            raw_dets.push(RawDetection {
                x1: ((cx - w / 2.0) - pad_x as f64) / scale,
                y1: ((cy - h / 2.0) - pad_y as f64) / scale,
                x2: ((cx + w / 2.0) - pad_x as f64) / scale,
                y2: ((cy + h / 2.0) - pad_y as f64) / scale,
                confidence: conf,
            });
        }

        Ok(nms(&mut raw_dets, NMS_IOU_THRESH))
    }

    fn embed(&self, crop: &Frame) -> Result<Embedding, Box<dyn std::error::Error>> {
        let tensor = preprocess_crop(crop.data(), crop.width(), crop.height());
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .embedder
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;
        if embedding_slice.len() != self.embedding_dim {
            return Err(format!(
                "Embedding model produced {} values, expected {}",
                embedding_slice.len(),
                self.embedding_dim
            )
            .into());
        }
        Ok(Embedding::new(embedding_slice.to_vec()))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&self, frame: &Frame) -> Result<Vec<AnalyzedFace>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let mut faces = Vec::new();
        for det in self.detect(frame)? {
            let bbox = BBox::from_corners(det.x1, det.y1, det.x2, det.y2);
            let crop = frame.crop(&bbox);
            if crop.width() == 0 || crop.height() == 0 {
                continue;
            }
            faces.push(AnalyzedFace {
                bbox,
                score: det.confidence as f32,
                embedding: self.embed(&crop)?,
            });
        }
        Ok(faces)
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn input_size(&self) -> Option<u32> {
        Some(self.input_size)
    }
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    if !model_path.exists() {
        return Err(format!("model not found: {}", model_path.display()).into());
    }
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region.
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Resize a face crop to 112×112, normalize to [-1, 1], NCHW layout.
fn preprocess_crop(rgb_data: &[u8], width: u32, height: u32) -> ndarray::Array4<f32> {
    let src_w = width as usize;
    let src_h = height as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));

    for y in 0..EMBED_INPUT_SIZE {
        let src_y =
            (((y as f64 + 0.5) * src_h as f64 / EMBED_INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..EMBED_INPUT_SIZE {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / EMBED_INPUT_SIZE as f64) as usize)
                .min(src_w - 1);
            let offset = (src_y * src_w + src_x) * 3;
            if offset + 2 < rgb_data.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (rgb_data[offset + c] as f32 - NORM_MEAN) / NORM_STD;
                }
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
/// The survivors keep that order.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && corner_iou(&dets[i].corners(), &dets[j].corners()) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn corner_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
