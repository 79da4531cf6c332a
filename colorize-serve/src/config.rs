use std::path::{Path, PathBuf};

use colorize::dnn::{
    model::{DEFAULT_ANNEALING, DEFAULT_INPUT_SIZE, DEFAULT_L_CENTER},
    PreprocessConfig,
};
use colorize::imgproc::interpolation::InterpolationMode;
use colorize::io::ImageFormat;
use colorize::pipeline::{
    pipeline::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_CONCURRENT_JOBS},
    validator::{DEFAULT_MAX_DIMENSION, DEFAULT_MAX_UPLOAD_BYTES},
    PipelineSettings, UploadLimits,
};
use serde::{Deserialize, Serialize};

/// Errors raised while loading the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read the configuration file {0}. {1}")]
    FileError(PathBuf, std::io::Error),

    /// The file is not valid JSON for the configuration.
    #[error("Failed to parse the configuration file {0}. {1}")]
    ParseError(PathBuf, serde_json::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Preprocessing recipe of the model.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessSettings {
    pub input_width: usize,
    pub input_height: usize,
    pub l_center: f32,
    pub interpolation: InterpolationMode,
    pub annealing: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_SIZE.width,
            input_height: DEFAULT_INPUT_SIZE.height,
            l_center: DEFAULT_L_CENTER,
            interpolation: InterpolationMode::Bilinear,
            annealing: DEFAULT_ANNEALING,
        }
    }
}

impl From<&PreprocessSettings> for PreprocessConfig {
    fn from(s: &PreprocessSettings) -> Self {
        PreprocessConfig {
            input_size: [s.input_width, s.input_height].into(),
            l_center: s.l_center,
            interpolation: s.interpolation,
            annealing: s.annealing,
        }
    }
}

/// Configuration of the service and the command line tools.
///
/// Every field has a default; a JSON file only needs the fields it changes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the HTTP server listens on.
    pub bind_address: String,
    /// Root directory of stored sources and results.
    pub storage_root: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// ONNX model file.
    pub model_path: PathBuf,
    /// Optional AB bin table, `.npy` or `.json`.
    pub bins_path: Option<PathBuf>,
    /// Intra-op threads of the runtime.
    pub num_threads: usize,
    /// Maximum upload size in bytes.
    pub max_upload_bytes: u64,
    /// Maximum image width in pixels.
    pub max_width: usize,
    /// Maximum image height in pixels.
    pub max_height: usize,
    /// Format of the colorized results.
    pub output_format: ImageFormat,
    /// Quality of JPEG results.
    pub jpeg_quality: u8,
    /// Deadline of a colorization request in seconds.
    pub request_timeout_secs: u64,
    /// Images colorized at the same time.
    pub max_concurrent_jobs: usize,
    /// Preprocessing recipe of the model.
    pub preprocess: PreprocessSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            storage_root: PathBuf::from("uploads"),
            database_path: PathBuf::from("colorize.sqlite3"),
            model_path: PathBuf::from("models/colorization.onnx"),
            bins_path: None,
            num_threads: 4,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            output_format: ImageFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            request_timeout_secs: 60,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            preprocess: PreprocessSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Load the configuration from a JSON file, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(path.to_path_buf(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Check the values that have no meaningful default behaviour when out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.output_format.can_encode() {
            return Err(ConfigError::InvalidValue(format!(
                "results cannot be encoded as {}",
                self.output_format
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "max_upload_bytes must be positive".to_string(),
            ));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidValue(
                "num_threads must be positive".to_string(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent_jobs must be positive".to_string(),
            ));
        }
        PreprocessConfig::from(&self.preprocess)
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Settings of the request pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            limits: UploadLimits {
                max_bytes: self.max_upload_bytes,
                max_width: self.max_width,
                max_height: self.max_height,
                ..Default::default()
            },
            output_format: self.output_format,
            jpeg_quality: self.jpeg_quality,
            max_concurrent_jobs: self.max_concurrent_jobs,
        }
    }

    /// Preprocessing recipe of the model.
    pub fn preprocess_config(&self) -> PreprocessConfig {
        PreprocessConfig::from(&self.preprocess)
    }
}
