//! # Composition
//!
//! Turns a [`CompositeRequest`] into a composited video. [`FrameCompositor`]
//! handles a single frame, [`CompositingPipeline`] drives a whole video through
//! a source and sink, and [`CompositionEngine`] is the service front end that
//! owns configuration and runs jobs off the async runtime.

pub mod engine;
pub mod frame;
pub mod pipeline;
pub mod request;

// Re-exports for convenience
pub use engine::CompositionEngine;
pub use frame::{FrameCompositor, FrameReport, PreparedRegions, SkipReason};
pub use pipeline::{CompositingPipeline, PipelineOptions, PipelineState, Progress, StopHandle};
pub use request::{CompositeRequest, CompositeResult, UserImage};
