use ndarray::ArrayView3;

use crate::shared::bbox::BBox;
use crate::shared::error::RecognitionError;

/// A decoded image frame: contiguous RGB bytes in row-major order.
///
/// Decoding happens at the request boundary only; the rest of the engine
/// treats pixel data as opaque and hands it to the face analyzer.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// Decodes encoded image bytes (JPEG, PNG, ...) into an RGB frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecognitionError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| RecognitionError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Self::new(img.into_raw(), width, height, 3))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels of `rect` (clamped to the frame) into a new frame.
    pub fn crop(&self, rect: &BBox) -> Frame {
        let fw = self.width as i32;
        let fh = self.height as i32;
        let x1 = rect.x.clamp(0, fw) as usize;
        let y1 = rect.y.clamp(0, fh) as usize;
        let x2 = (rect.x + rect.width).clamp(0, fw) as usize;
        let y2 = (rect.y + rect.height).clamp(0, fh) as usize;

        let crop_w = x2.saturating_sub(x1);
        let crop_h = y2.saturating_sub(y1);
        let channels = self.channels as usize;
        let row_bytes = self.width as usize * channels;

        let mut data = Vec::with_capacity(crop_w * crop_h * channels);
        for row in y1..y1 + crop_h {
            let start = row * row_bytes + x1 * channels;
            data.extend_from_slice(&self.data[start..start + crop_w * channels]);
        }

        Frame::new(data, crop_w as u32, crop_h as u32, self.channels)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
