use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};
use tracing::trace;

use crate::chroma::mask::SoftMask;
use crate::error::{ChromaError, Result};

/// Chebyshev radius of the square structuring element (2 -> 5x5).
const STRUCTURING_RADIUS: u8 = 2;

/// Per-pixel blend weight in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMask {
    buffer: ImageBuffer<Luma<f32>, Vec<f32>>,
}

impl AlphaMask {
    /// Normalize an 8-bit mask into [0, 1].
    pub fn from_mask(mask: &SoftMask) -> Self {
        let buffer = ImageBuffer::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([mask.get_pixel(x, y).0[0] as f32 / 255.0])
        });
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.buffer.get_pixel(x, y).0[0]
    }

    pub fn values(&self) -> &[f32] {
        self.buffer.as_raw()
    }

    /// Scale back to 8 bits for viewing or saving.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([(self.get(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }

    /// Copy out the rectangle at (`x`, `y`), clipped to the mask bounds.
    ///
    /// The result may be smaller than requested when the rectangle runs off
    /// the edge; callers compare dimensions before using it.
    pub fn sub_grid(&self, x: u32, y: u32, width: u32, height: u32) -> AlphaMask {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        let buffer = ImageBuffer::from_fn(width, height, |dx, dy| *self.buffer.get_pixel(x + dx, y + dy));
        Self { buffer }
    }
}

/// Morphological cleanup and edge feathering of a raw key mask.
pub struct MaskRefiner;

impl MaskRefiner {
    /// Close (fill small holes), open (drop small islands), optionally feather,
    /// and normalize to [0, 1].
    ///
    /// `edge_feather` is a blur radius in pixels; 0 skips feathering so the
    /// output stays strictly 0 or 1. Negative radii are rejected.
    pub fn refine(mask: &SoftMask, edge_feather: i32) -> Result<AlphaMask> {
        if edge_feather < 0 {
            return Err(ChromaError::NegativeFeather { value: edge_feather }.into());
        }

        let closed = close(mask, Norm::LInf, STRUCTURING_RADIUS);
        let cleaned = open(&closed, Norm::LInf, STRUCTURING_RADIUS);
        let alpha = AlphaMask::from_mask(&cleaned);

        if edge_feather == 0 {
            return Ok(alpha);
        }

        let sigma = feather_sigma(edge_feather);
        trace!("Feathering mask with radius {} (sigma {:.2})", edge_feather, sigma);

        let mut blurred = gaussian_blur_f32(&alpha.buffer, sigma);
        for p in blurred.pixels_mut() {
            p.0[0] = p.0[0].clamp(0.0, 1.0);
        }
        Ok(AlphaMask { buffer: blurred })
    }
}

/// Sigma for an odd kernel of size `2r + 1`, using the usual derivation for
/// Gaussian kernels specified by size alone.
fn feather_sigma(radius: i32) -> f32 {
    let ksize = (2 * radius + 1) as f32;
    0.3 * ((ksize - 1.0) * 0.5 - 1.0) + 0.8
}
