use colorize_image::ImageSize;

/// An error type for the dnn module.
#[derive(thiserror::Error, Debug)]
pub enum DnnError {
    /// Error raised by ONNX Runtime.
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error. {0}")]
    OrtError(#[from] ort::Error),

    /// Error to create or transform an image.
    #[error("Image error. {0}")]
    ImageError(#[from] colorize_image::ImageError),

    /// Error to read a model artifact.
    #[error("Failed to read the model artifact. {0}")]
    FileError(#[from] std::io::Error),

    /// The model artifact does not exist.
    #[error("Model file does not exist: {0}")]
    ModelNotFound(std::path::PathBuf),

    /// The handle holds no usable model.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model produced an output that cannot be decoded into AB.
    #[error("Unexpected model output of {channels} channels at {size}: {reason}")]
    OutputShapeMismatch {
        /// Number of output channels.
        channels: usize,
        /// Spatial size of the output.
        size: ImageSize,
        /// What is inconsistent.
        reason: String,
    },

    /// The model produced NaN or infinite values.
    #[error("Model output contains non-finite values")]
    NonFiniteOutput,

    /// The AB bin table could not be parsed.
    #[error("Invalid AB bin table: {0}")]
    InvalidBins(String),

    /// The preprocessing configuration is not usable.
    #[error("Invalid preprocessing configuration: {0}")]
    InvalidConfig(String),

    /// The session lock was poisoned by a panicking inference.
    #[error("Model session lock poisoned")]
    LockPoisoned,
}

/// The failure of a single colorization inference.
pub type InferenceError = DnnError;
