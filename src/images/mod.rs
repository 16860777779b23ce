//! # User Images
//!
//! Resolution of user image locators into decoded rasters. Remote URLs are
//! fetched with a bounded timeout and size limit; anything else is read from disk.

pub mod resolver;

pub use resolver::{DefaultImageResolver, ImageResolver, ImageSet, StaticImageResolver};
