#![deny(missing_docs)]
//! # Colorize DNN
//!
//! The colorization network seen from the pipeline: a [`model::ModelHandle`] loaded once at
//! start-up and the [`invoker::colorize`] function that turns a luminance channel into the
//! predicted chrominance.

/// Quantized AB bin centers and annealed-mean decoding.
pub mod bins;

/// Error type for the dnn module.
pub mod error;

/// Preprocess the L channel, run the model and decode its output into AB.
pub mod invoker;

/// The model seam and the process-wide model handle.
pub mod model;

/// ONNX Runtime backend.
#[cfg(feature = "onnx")]
pub mod onnx;

pub use crate::bins::AbBins;
pub use crate::error::{DnnError, InferenceError};
pub use crate::invoker::colorize;
pub use crate::model::{
    load_model_handle, ColorizationModel, ModelHandle, ModelOutput, PreprocessConfig,
};
