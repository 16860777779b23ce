use image::GrayImage;
use rayon::prelude::*;

use crate::chroma::settings::ChromaSettings;
use crate::video::types::Frame;

/// Single-channel 8-bit segmentation mask, same size as its frame.
/// 255 marks key-colored pixels, 0 everything else.
pub type SoftMask = GrayImage;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Convert one RGB pixel to 8-bit HSV.
///
/// Hue is degrees halved and rounded (0..180), saturation and value span
/// 0..=255. Achromatic pixels get hue 0.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;

    if max == 0 {
        return [0, 0, 0];
    }

    let delta = (max - min) as f32;
    let s = (255.0 * delta / max as f32).round() as u8;
    if delta == 0.0 {
        return [0, s, v];
    }

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut h = if max as f32 == r {
        60.0 * (g - b) / delta
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u16 % 180;
    [h as u8, s, v]
}

/// Marks pixels whose HSV triple falls inside the configured key ranges.
pub struct ColorMasker;

impl ColorMasker {
    /// Build the binary key mask for `frame`. Pure and deterministic.
    pub fn mask(frame: &Frame, settings: &ChromaSettings) -> SoftMask {
        let (width, height) = (frame.width(), frame.height());
        let mut mask = SoftMask::new(width, height);

        let data: &mut [u8] = &mut mask;
        data.par_iter_mut()
            .zip(frame.as_rgb_bytes().par_chunks_exact(3))
            .for_each(|(out, px)| {
                if settings.matches(rgb_to_hsv([px[0], px[1], px[2]])) {
                    *out = MASK_ON;
                }
            });

        mask
    }
}
