use rayon::prelude::*;

use crate::video::types::Frame;

/// Suppresses green cast left on pixels near the key boundary.
pub struct SpillCorrector;

impl SpillCorrector {
    /// Return a spill-corrected copy of `frame`.
    pub fn correct(frame: &Frame, strength: f32) -> Frame {
        let mut out = frame.clone();
        Self::correct_in_place(&mut out, strength);
        out
    }

    /// Pull each pixel's green channel toward the mean of red and blue by
    /// `strength` times its excess. Pixels with no green excess are untouched.
    pub fn correct_in_place(frame: &mut Frame, strength: f32) {
        let strength = strength.clamp(0.0, 1.0);
        if strength == 0.0 {
            return;
        }

        frame
            .as_image_mut()
            .par_chunks_exact_mut(3)
            .for_each(|px| Self::correct_pixel(px, strength));
    }

    /// Spill-correct a single packed RGB pixel.
    #[inline]
    pub fn correct_pixel(px: &mut [u8], strength: f32) {
        let excess = px[1] as f32 - (px[0] as f32 + px[2] as f32) / 2.0;
        if excess > 0.0 {
            px[1] = (px[1] as f32 - strength * excess).round().clamp(0.0, 255.0) as u8;
        }
    }
}
