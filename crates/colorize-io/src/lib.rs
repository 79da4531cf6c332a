#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for I/O operations.
///
/// Defines [`IoError`](error::IoError) variants for file access, encoding/decoding failures,
/// and format-specific errors.
pub mod error;

/// Container format detection from magic bytes.
pub mod format;

/// High-level image decoding and encoding functions.
///
/// See [`functional::decode_image_rgb8`] for automatic format detection.
pub mod functional;

/// JPEG image encoding and decoding.
///
/// Pure Rust JPEG codec for reading and writing JPEG images.
pub mod jpeg;

/// PNG image encoding and decoding.
///
/// Read and write PNG images with support for various bit depths and color types.
pub mod png;

/// Internal utility functions for channel layout conversion.
mod conv_utils;

pub use crate::error::IoError;
pub use crate::format::ImageFormat;
