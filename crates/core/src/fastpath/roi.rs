/// Search region for the fast path, derived from where the face was on the
/// previous frame.
///
/// Callers describe that box in one of two conventions. `Raw` is already in
/// the posted frame's pixel space. `Scaled` is the older convention: a box
/// measured on a displayed copy of the frame of size `send_width` ×
/// `send_height`, which is linearly rescaled before use. Hints are tried in
/// priority order and the first one that yields a usable region wins.
use serde::Deserialize;

use crate::shared::bbox::BBox;
use crate::shared::error::RecognitionError;

#[derive(Clone, Debug, PartialEq)]
pub enum RoiHint {
    Raw {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    Scaled {
        send_width: f64,
        send_height: f64,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
}

/// Previous-box fields as they arrive on a fast-path request. Any subset
/// may be present.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PrevBox {
    /// JSON `[x, y, w, h]` in posted-frame space.
    pub prev_bbox: Option<String>,
    pub send_w: Option<f64>,
    pub send_h: Option<f64>,
    pub prev_x: Option<f64>,
    pub prev_y: Option<f64>,
    pub prev_w: Option<f64>,
    pub prev_h: Option<f64>,
}

impl PrevBox {
    pub fn is_empty(&self) -> bool {
        self.prev_bbox.is_none()
            && self.send_w.is_none()
            && self.send_h.is_none()
            && self.prev_x.is_none()
            && self.prev_y.is_none()
            && self.prev_w.is_none()
            && self.prev_h.is_none()
    }

    /// Hints in priority order: raw first, then the scaled convention when
    /// all six of its fields are present.
    pub fn hints(&self) -> Vec<Result<RoiHint, RecognitionError>> {
        let mut hints = Vec::with_capacity(2);
        if let Some(raw) = &self.prev_bbox {
            hints.push(RoiHint::parse_raw(raw));
        }
        if let (Some(send_w), Some(send_h), Some(x), Some(y), Some(w), Some(h)) = (
            self.send_w,
            self.send_h,
            self.prev_x,
            self.prev_y,
            self.prev_w,
            self.prev_h,
        ) {
            hints.push(Ok(RoiHint::Scaled {
                send_width: send_w,
                send_height: send_h,
                x,
                y,
                w,
                h,
            }));
        }
        hints
    }
}

impl RoiHint {
    pub fn parse_raw(json: &str) -> Result<Self, RecognitionError> {
        let [x, y, w, h]: [f64; 4] = serde_json::from_str(json)
            .map_err(|e| RecognitionError::InvalidRoi(format!("prev_bbox {json:?}: {e}")))?;
        Ok(RoiHint::Raw { x, y, w, h })
    }

    /// The hinted box in the pixel space of a `frame_w` × `frame_h` frame.
    pub fn to_frame_space(
        &self,
        frame_w: u32,
        frame_h: u32,
    ) -> Result<(f64, f64, f64, f64), RecognitionError> {
        let rect = match *self {
            RoiHint::Raw { x, y, w, h } => (x, y, w, h),
            RoiHint::Scaled {
                send_width,
                send_height,
                x,
                y,
                w,
                h,
            } => {
                if !(send_width > 0.0 && send_height > 0.0) {
                    return Err(RecognitionError::InvalidRoi(format!(
                        "display size {send_width}x{send_height} must be positive"
                    )));
                }
                let sx = frame_w as f64 / send_width;
                let sy = frame_h as f64 / send_height;
                (x * sx, y * sy, w * sx, h * sy)
            }
        };
        let (x, y, w, h) = rect;
        if ![x, y, w, h].iter().all(|v| v.is_finite()) {
            return Err(RecognitionError::InvalidRoi(
                "box has non-finite coordinates".into(),
            ));
        }
        if w <= 0.0 || h <= 0.0 {
            return Err(RecognitionError::InvalidRoi(format!(
                "box size {w}x{h} must be positive"
            )));
        }
        Ok(rect)
    }
}

/// Clamped search region in corner form; `x2`/`y2` are exclusive crop
/// bounds and never exceed `width - 1` / `height - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Roi {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Roi {
    pub fn as_bbox(&self) -> BBox {
        BBox::new(self.x1, self.y1, self.x2 - self.x1, self.y2 - self.y1)
    }
}

/// Grows `(x, y, w, h)` by `margin * max(w, h)` on every side and clamps it
/// to the frame. Returns `None` when either side of the clamped region is
/// shorter than `min_side`.
pub fn expand_and_clamp(
    rect: (f64, f64, f64, f64),
    frame_w: u32,
    frame_h: u32,
    margin: f64,
    min_side: i32,
) -> Option<Roi> {
    if frame_w == 0 || frame_h == 0 {
        return None;
    }
    let (x, y, w, h) = rect;
    let m = (margin * w.max(h)).trunc();
    let max_x = frame_w as i64 - 1;
    let max_y = frame_h as i64 - 1;
    let clamp = |v: f64, hi: i64| (v.trunc() as i64).clamp(0, hi) as i32;

    let roi = Roi {
        x1: clamp(x - m, max_x),
        y1: clamp(y - m, max_y),
        x2: clamp(x + w + m, max_x),
        y2: clamp(y + h + m, max_y),
    };
    if roi.x2 - roi.x1 < min_side || roi.y2 - roi.y1 < min_side {
        return None;
    }
    Some(roi)
}

/// Resolves the first usable region among `hints`. Invalid or degenerate
/// hints are skipped; `None` means full-frame detection.
pub fn resolve_roi(
    prev: &PrevBox,
    frame_w: u32,
    frame_h: u32,
    margin: f64,
    min_side: i32,
) -> Option<Roi> {
    for hint in prev.hints() {
        let rect = match hint.and_then(|h| h.to_frame_space(frame_w, frame_h)) {
            Ok(rect) => rect,
            Err(e) => {
                log::warn!("Discarding ROI hint: {e}");
                continue;
            }
        };
        match expand_and_clamp(rect, frame_w, frame_h, margin, min_side) {
            Some(roi) => return Some(roi),
            None => log::debug!("ROI hint {rect:?} clamps below {min_side}px, skipping"),
        }
    }
    None
}
