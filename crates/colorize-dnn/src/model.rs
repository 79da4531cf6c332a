use std::sync::Arc;

use colorize_image::{Image, ImageSize};
use colorize_imgproc::interpolation::InterpolationMode;

use crate::{bins::AbBins, error::DnnError};

/// Default spatial input size of the published colorization network.
pub const DEFAULT_INPUT_SIZE: ImageSize = ImageSize {
    width: 224,
    height: 224,
};

/// Default centering constant subtracted from L before inference.
pub const DEFAULT_L_CENTER: f32 = 50.0;

/// Default annealing factor applied to the bin logits.
pub const DEFAULT_ANNEALING: f32 = 2.606;

/// The preprocessing and decoding recipe the network was trained with.
#[derive(Clone, Debug, PartialEq)]
pub struct PreprocessConfig {
    /// Fixed spatial resolution of the network input.
    pub input_size: ImageSize,
    /// Value subtracted from L (in `[0, 100]`) before inference.
    pub l_center: f32,
    /// Interpolation used to bring L to `input_size`.
    pub interpolation: InterpolationMode,
    /// Annealing factor `T` of the softmax over bin logits.
    pub annealing: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            l_center: DEFAULT_L_CENTER,
            interpolation: InterpolationMode::Bilinear,
            annealing: DEFAULT_ANNEALING,
        }
    }
}

impl PreprocessConfig {
    /// Check that the recipe can be applied.
    pub fn validate(&self) -> Result<(), DnnError> {
        if self.input_size.is_empty() {
            return Err(DnnError::InvalidConfig(format!(
                "input size must be positive, got {}",
                self.input_size
            )));
        }
        if !self.l_center.is_finite() {
            return Err(DnnError::InvalidConfig("L center must be finite".into()));
        }
        if !(self.annealing.is_finite() && self.annealing > 0.0) {
            return Err(DnnError::InvalidConfig(format!(
                "annealing factor must be positive, got {}",
                self.annealing
            )));
        }
        Ok(())
    }
}

/// Raw network output in planar layout, shape `(channels, height, width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelOutput {
    /// Number of output planes.
    pub channels: usize,
    /// Spatial size of every plane.
    pub size: ImageSize,
    /// `channels * height * width` values, plane after plane.
    pub data: Vec<f32>,
}

/// A colorization network seen as a pure function.
///
/// The input is the centered L channel at the configured input size. The output is either two
/// planes holding a and b directly or one logit plane per quantized AB bin.
pub trait ColorizationModel: Send + Sync {
    /// Human readable identifier, used in logs.
    fn name(&self) -> &str {
        "colorization-model"
    }

    /// Run one forward pass.
    fn forward(&self, input: &Image<f32, 1>) -> Result<ModelOutput, DnnError>;
}

enum Backend {
    Ready(Box<dyn ColorizationModel>),
    Unavailable(String),
}

struct HandleInner {
    backend: Backend,
    preprocess: PreprocessConfig,
    bins: Option<AbBins>,
}

/// Process-wide, read-only handle on the loaded colorization model.
///
/// Cloning is cheap; all clones share the same model.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

impl ModelHandle {
    /// Wrap a loaded model together with its recipe and optional bin table.
    pub fn new(
        model: impl ColorizationModel + 'static,
        preprocess: PreprocessConfig,
        bins: Option<AbBins>,
    ) -> Self {
        Self::from_boxed(Box::new(model), preprocess, bins)
    }

    fn from_boxed(
        model: Box<dyn ColorizationModel>,
        preprocess: PreprocessConfig,
        bins: Option<AbBins>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                backend: Backend::Ready(model),
                preprocess,
                bins,
            }),
        }
    }

    /// A handle that fails every inference with the given reason.
    pub fn unavailable(reason: impl Into<String>, preprocess: PreprocessConfig) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                backend: Backend::Unavailable(reason.into()),
                preprocess,
                bins: None,
            }),
        }
    }

    /// Whether a model is loaded.
    pub fn is_available(&self) -> bool {
        matches!(self.inner.backend, Backend::Ready(_))
    }

    /// Name of the loaded model, or the reason it is missing.
    pub fn describe(&self) -> String {
        match &self.inner.backend {
            Backend::Ready(model) => model.name().to_string(),
            Backend::Unavailable(reason) => format!("unavailable ({reason})"),
        }
    }

    /// The preprocessing recipe.
    pub fn preprocess(&self) -> &PreprocessConfig {
        &self.inner.preprocess
    }

    /// The quantized AB bin centers, when the model emits bin logits.
    pub fn bins(&self) -> Option<&AbBins> {
        self.inner.bins.as_ref()
    }

    pub(crate) fn model(&self) -> Result<&dyn ColorizationModel, DnnError> {
        match &self.inner.backend {
            Backend::Ready(model) => Ok(model.as_ref()),
            Backend::Unavailable(reason) => Err(DnnError::ModelUnavailable(reason.clone())),
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.describe())
            .field("preprocess", &self.inner.preprocess)
            .field("bins", &self.inner.bins.as_ref().map(|b| b.len()))
            .finish()
    }
}

/// Load the model artifacts into a handle.
///
/// Loading never fails: a missing or broken artifact yields an unavailable handle and every
/// inference through it reports the reason.
///
/// # Arguments
///
/// * `model_path` - The ONNX model file.
/// * `bins_path` - Optional AB bin table (`.npy` or `.json`).
/// * `num_threads` - Intra-op threads of the runtime.
/// * `preprocess` - The preprocessing recipe.
pub fn load_model_handle(
    model_path: &std::path::Path,
    bins_path: Option<&std::path::Path>,
    num_threads: usize,
    preprocess: PreprocessConfig,
) -> ModelHandle {
    if let Err(e) = preprocess.validate() {
        log::error!("refusing to load the model: {e}");
        return ModelHandle::unavailable(e.to_string(), preprocess);
    }

    let bins = match bins_path.map(AbBins::from_file).transpose() {
        Ok(bins) => bins,
        Err(e) => {
            log::error!("failed to load the AB bin table: {e}");
            return ModelHandle::unavailable(e.to_string(), preprocess);
        }
    };

    match load_backend(model_path, num_threads) {
        Ok(model) => {
            log::info!(
                "loaded colorization model {} ({} threads, {} bins)",
                model_path.display(),
                num_threads,
                bins.as_ref().map_or(0, |b| b.len())
            );
            ModelHandle::from_boxed(model, preprocess, bins)
        }
        Err(e) => {
            log::error!("failed to load the model {}: {e}", model_path.display());
            ModelHandle::unavailable(e.to_string(), preprocess)
        }
    }
}

#[cfg(feature = "onnx")]
fn load_backend(
    model_path: &std::path::Path,
    num_threads: usize,
) -> Result<Box<dyn ColorizationModel>, DnnError> {
    let model = crate::onnx::OnnxColorizerBuilder::new(model_path.to_path_buf())?
        .with_num_threads(num_threads)
        .build()?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_backend(
    model_path: &std::path::Path,
    _num_threads: usize,
) -> Result<Box<dyn ColorizationModel>, DnnError> {
    if !model_path.exists() {
        return Err(DnnError::ModelNotFound(model_path.to_path_buf()));
    }
    Err(DnnError::ModelUnavailable(
        "ONNX Runtime support is not enabled".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl ColorizationModel for Constant {
        fn forward(&self, input: &Image<f32, 1>) -> Result<ModelOutput, DnnError> {
            Ok(ModelOutput {
                channels: 2,
                size: input.size(),
                data: vec![0.0; 2 * input.size().area()],
            })
        }
    }

    #[test]
    fn default_recipe() {
        let config = PreprocessConfig::default();
        assert_eq!(config.input_size, [224, 224].into());
        assert_eq!(config.l_center, 50.0);
        assert_eq!(config.annealing, 2.606);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_recipe() {
        let mut config = PreprocessConfig::default();
        config.annealing = 0.0;
        assert!(config.validate().is_err());

        let mut config = PreprocessConfig::default();
        config.input_size = [0, 224].into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn handle_states() {
        let ready = ModelHandle::new(Constant, PreprocessConfig::default(), None);
        assert!(ready.is_available());
        assert!(ready.model().is_ok());
        assert_eq!(ready.describe(), "colorization-model");

        let down = ModelHandle::unavailable("no weights", PreprocessConfig::default());
        assert!(!down.is_available());
        assert!(matches!(
            down.model(),
            Err(DnnError::ModelUnavailable(reason)) if reason == "no weights"
        ));
    }

    #[test]
    fn missing_artifact_gives_unavailable_handle() {
        let handle = load_model_handle(
            std::path::Path::new("/nonexistent/colorizer.onnx"),
            None,
            1,
            PreprocessConfig::default(),
        );
        assert!(!handle.is_available());
    }
}
