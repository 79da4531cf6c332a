//! # ONNX colorizer
//!
//! Runs an exported colorization network with ONNX Runtime.
//!
//! The network takes one input of shape `[1, 1, H, W]` (the centered L channel) and returns
//! one output of shape `[1, C, h, w]`, with `C` either 2 or the number of AB bins.

use std::{path::PathBuf, sync::Mutex};

use colorize_image::{Image, ImageSize};
use ort::session::{builder::GraphOptimizationLevel, Session};

use crate::{
    error::DnnError,
    model::{ColorizationModel, ModelOutput},
};

/// Builder for the ONNX colorizer.
pub struct OnnxColorizerBuilder {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,
    /// Number of threads to use for inference.
    pub num_threads: usize,
}

impl OnnxColorizerBuilder {
    /// Creates a new `OnnxColorizerBuilder` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`DnnError::ModelNotFound`] if the model file does not exist.
    pub fn new(model_path: PathBuf) -> Result<Self, DnnError> {
        if !model_path.exists() {
            return Err(DnnError::ModelNotFound(model_path));
        }
        Ok(Self {
            model_path,
            num_threads: 4,
        })
    }

    /// Sets the number of threads to use for inference.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    /// Builds and returns an `OnnxColorizer` instance.
    pub fn build(self) -> Result<OnnxColorizer, DnnError> {
        OnnxColorizer::new(self.model_path, self.num_threads)
    }
}

/// Colorization network executed by ONNX Runtime.
///
/// The session is serialized behind a mutex since running it needs exclusive access.
pub struct OnnxColorizer {
    session: Mutex<Session>,
    name: String,
}

impl OnnxColorizer {
    /// Creates a new `OnnxColorizer` instance.
    ///
    /// Pre-requisites:
    /// - ORT_DYLIB_PATH environment variable must point to the ORT dylib.
    pub fn new(model_path: PathBuf, num_threads: usize) -> Result<Self, DnnError> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_threads)?
            .commit_from_file(&model_path)?;

        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx")
            .to_string();

        Ok(Self {
            session: Mutex::new(session),
            name,
        })
    }
}

impl ColorizationModel for OnnxColorizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Image<f32, 1>) -> Result<ModelOutput, DnnError> {
        let shape = [1usize, 1, input.rows(), input.cols()];
        let ort_tensor = ort::value::Tensor::from_array((shape, input.as_slice().to_vec()))?;

        let mut session = self.session.lock().map_err(|_| DnnError::LockPoisoned)?;
        let outputs = session.run(ort::inputs![ort_tensor])?;

        // we expect the output tensor to be of shape [1, C, h, w]
        let (out_shape, out_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims = output_dims(out_shape)?;

        match dims.as_slice() {
            [1, channels, height, width] => Ok(ModelOutput {
                channels: *channels,
                size: ImageSize {
                    width: *width,
                    height: *height,
                },
                data: out_data.to_vec(),
            }),
            _ => Err(DnnError::OutputShapeMismatch {
                channels: 0,
                size: [0, 0].into(),
                reason: format!("expected an output of shape [1, C, H, W], got {dims:?}"),
            }),
        }
    }
}

// dynamic (-1) or negative dimensions are reported instead of read as empty
fn output_dims(shape: &[i64]) -> Result<Vec<usize>, DnnError> {
    shape
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| {
                DnnError::InvalidConfig(format!("model output has an unresolved dimension in {shape:?}"))
            })
        })
        .collect()
}
