use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Represents a single video frame
///
/// A thin wrapper around an RGB8 image buffer. Channel order is always R, G, B;
/// sources convert into this order and sinks read from it.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::new(width, height),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Borrow the packed RGB bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }
}

impl From<RgbImage> for Frame {
    fn from(buffer: RgbImage) -> Self {
        Self::new(buffer)
    }
}

/// Stream properties reported by a [`VideoSource`](super::VideoSource) on open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Best-effort frame count; used for progress reporting only
    pub frame_count: u64,
}

impl VideoInfo {
    /// Size in bytes of one packed RGB8 frame
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Output encoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// Video codec passed to the encoder
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Output pixel format
    pub pixel_format: String,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            quality: 85,
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl VideoParams {
    /// Map the 0-100 quality scale onto x264's CRF range (0 best, 51 worst)
    pub fn crf(&self) -> u8 {
        (51 - ((self.quality.min(100) as f32 / 100.0) * 51.0) as u8).min(51)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes_roundtrip() {
        let frame = Frame::new_filled(4, 2, [10, 20, 30]);
        let bytes = frame.as_rgb_bytes().to_vec();
        assert_eq!(bytes.len(), 4 * 2 * 3);

        let rebuilt = Frame::from_rgb_bytes(4, 2, bytes).unwrap();
        assert_eq!(rebuilt, frame);
        assert!(Frame::from_rgb_bytes(4, 2, vec![0; 5]).is_none());
    }

    #[test]
    fn test_quality_to_crf() {
        let mut params = VideoParams::default();
        params.quality = 100;
        assert_eq!(params.crf(), 0);
        params.quality = 0;
        assert_eq!(params.crf(), 51);
    }
}
