//! # Region Module
//!
//! Green screen regions (where and when a user image appears) and the fitter
//! that shapes a user image to a region's pixel rectangle.

pub mod fitter;
pub mod types;

pub use fitter::RegionFitter;
pub use types::{FitMode, GreenScreenRegion, NormalizedRect, PixelRect};
