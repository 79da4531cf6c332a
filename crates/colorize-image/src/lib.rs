#![deny(missing_docs)]
//! Image types and channel-space wrappers used across the colorization pipeline.

/// image representation for computer vision purposes.
pub mod image;

/// Error types for the image module.
pub mod error;

/// Typed channel-space wrappers with their value-range conventions.
pub mod color_spaces;

/// Image operations that do not depend on image processing.
pub mod ops;

pub use crate::color_spaces::{Abf32, ChannelSpace, Gray8, Labf32, Lf32, Rgb8, Rgbf32};
pub use crate::error::ImageError;
pub use crate::image::{Image, ImageSize};
