//! # Video Module
//!
//! Frame type plus the decode/encode collaborators the compositing pipeline
//! talks to. Both ends shell out to the system `ffmpeg`; in-memory variants
//! exist for tests and synthetic input.

pub mod sink;
pub mod source;
pub mod types;

pub use sink::{FfmpegSink, InMemorySink, VideoSink};
pub use source::{FfmpegSource, InMemorySource, VideoSource};
pub use types::{Frame, VideoInfo, VideoParams};
