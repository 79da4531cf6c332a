#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// color transformations module.
pub mod color;

/// utilities for interpolation.
pub mod interpolation;

/// module containing parallization utilities.
pub mod parallel;

/// utility functions for resizing images.
pub mod resize;
