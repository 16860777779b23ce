//! # Greenscreen-Compositor
//!
//! Replace the green screen areas of a video with still images, frame by frame.
//!
//! Each frame of a base video is chroma keyed in HSV space, the key mask is
//! cleaned up and feathered, and user images fitted to normalized regions are
//! blended in wherever the key matched. Regions are only active over their
//! own frame ranges.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greenscreen_compositor::{
//!     composition::{CompositeRequest, CompositionEngine},
//!     config::Config,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = CompositionEngine::new(Config::default())?;
//! let request = CompositeRequest::from_file("request.json")?;
//!
//! let result = engine.composite(request, Some("composite.mp4".into())).await?;
//! println!("{} frames in {:.1}s", result.frame_count, result.processing_time_secs);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`chroma`] - Key masking, mask refinement and spill correction
//! - [`region`] - Region geometry and image fitting
//! - [`composition`] - Per-frame compositing, the video pipeline and the engine
//! - [`images`] - User image resolution
//! - [`video`] - Frames and ffmpeg-backed sources and sinks
//! - [`config`] - Configuration management
//!
//! ## Compositing a single frame
//!
//! ```rust
//! use greenscreen_compositor::{
//!     chroma::ChromaSettings,
//!     composition::FrameCompositor,
//!     images::ImageSet,
//!     region::{FitMode, GreenScreenRegion, NormalizedRect},
//!     video::Frame,
//! };
//! use image::{Rgb, RgbImage};
//!
//! let frame = Frame::new_filled(10, 10, [0, 255, 0]);
//! let regions = vec![GreenScreenRegion {
//!     index: 0,
//!     start_frame: 0,
//!     end_frame: 0,
//!     position: NormalizedRect::full(),
//!     fit_mode: FitMode::Fill,
//! }];
//! let mut images = ImageSet::new();
//! images.insert(0, RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
//!
//! let settings = ChromaSettings { edge_feather: 0, ..ChromaSettings::default() };
//! let out = FrameCompositor::composite(&frame, 0, &regions, &images, &settings).unwrap();
//! assert_eq!(out.get_pixel(5, 5), [255, 0, 0]);
//! ```

pub mod chroma;
pub mod composition;
pub mod config;
pub mod error;
pub mod images;
pub mod region;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositeRequest, CompositeResult, CompositionEngine},
    config::Config,
    error::{CompositorError, Result},
};
