//! # Chroma Key Module
//!
//! Turns a video frame into a per-pixel blend weight for the key color, and
//! cleans up color spill after compositing.
//!
//! ## Stages
//!
//! - **Masking**: RGB to 8-bit HSV, in-range test against [`ChromaSettings`]
//! - **Refinement**: morphological close/open with a 5x5 square, optional Gaussian feather
//! - **Spill correction**: pull excess green toward the red/blue mean
//!
//! ## Usage
//!
//! ```rust,no_run
//! use greenscreen_compositor::chroma::{ChromaSettings, ColorMasker, MaskRefiner};
//! use greenscreen_compositor::video::Frame;
//!
//! # fn main() -> greenscreen_compositor::Result<()> {
//! let frame = Frame::new_filled(64, 64, [0, 255, 0]);
//! let settings = ChromaSettings::default();
//!
//! let mask = ColorMasker::mask(&frame, &settings);
//! let alpha = MaskRefiner::refine(&mask, settings.edge_feather)?;
//! assert_eq!(alpha.dimensions(), (64, 64));
//! # Ok(())
//! # }
//! ```

pub mod mask;
pub mod refine;
pub mod settings;
pub mod spill;

pub use mask::{rgb_to_hsv, ColorMasker, SoftMask};
pub use refine::{AlphaMask, MaskRefiner};
pub use settings::{ChannelRange, ChromaSettings};
pub use spill::SpillCorrector;
