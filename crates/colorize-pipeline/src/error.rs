use colorize_dnn::DnnError;
use colorize_image::ImageError;
use colorize_io::IoError;
use uuid::Uuid;

use crate::ledger::{ColorizationResult, PipelineStage};

/// Why an upload was rejected before anything was stored.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidUpload {
    /// The upload carries no bytes.
    #[error("The uploaded file is empty")]
    Empty,

    /// The upload exceeds the configured size limit.
    #[error("The uploaded file is {size} bytes, the limit is {max} bytes")]
    TooLarge {
        /// Size of the upload in bytes.
        size: u64,
        /// Configured maximum in bytes.
        max: u64,
    },

    /// The declared size does not match the received bytes.
    #[error("Declared size of {declared} bytes does not match the {received} bytes received")]
    SizeMismatch {
        /// Size announced by the client.
        declared: u64,
        /// Size actually received.
        received: u64,
    },

    /// No usable file name was given.
    #[error("No file name given")]
    MissingFilename,

    /// The file name extension is not an allowed image type.
    #[error("Invalid file type '{0}'. Please upload an image")]
    DisallowedExtension(String),

    /// The content is an image format that is not accepted.
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    /// The declared image dimensions exceed the configured maximum.
    #[error("Image of {width}x{height} exceeds the maximum of {max_width}x{max_height}")]
    DimensionsTooLarge {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Configured maximum width.
        max_width: usize,
        /// Configured maximum height.
        max_height: usize,
    },

    /// The image declares an empty size.
    #[error("Image has no pixels")]
    EmptyImage,
}

/// An error type for the file storage.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// The owner id cannot be used as a directory name.
    #[error("Invalid owner id: {0:?}")]
    InvalidOwner(String),

    /// The relative path escapes the storage root.
    #[error("Path is outside of the storage root: {0}")]
    OutsideRoot(String),

    /// Error to manipulate a file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to move a finished temporary file in place.
    #[error("Failed to persist the file. {0}")]
    PersistError(#[from] tempfile::PersistError),
}

/// An error type for the history ledger.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// Error raised by the database.
    #[error("Database error. {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Error to prepare the database location.
    #[error("Failed to prepare the database file. {0}")]
    FileError(#[from] std::io::Error),

    /// The requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// The requested row belongs to another owner.
    #[error("Row {id} is not accessible to owner {owner}")]
    AuthorizationError {
        /// The requested row.
        id: Uuid,
        /// The requesting owner.
        owner: String,
    },

    /// The result row already left the pending state.
    #[error("Result {0} is already finalized")]
    AlreadyFinalized(Uuid),
}

/// The underlying cause of a pipeline failure.
#[derive(thiserror::Error, Debug)]
pub enum PipelineCause {
    /// The upload was rejected.
    #[error(transparent)]
    InvalidUpload(#[from] InvalidUpload),

    /// The bytes could not be decoded.
    #[error("Decode error. {0}")]
    DecodeError(IoError),

    /// The result could not be encoded.
    #[error("Encode error. {0}")]
    EncodeError(IoError),

    /// The model could not produce chrominance.
    #[error("Inference error. {0}")]
    InferenceError(#[from] DnnError),

    /// A color-space transform failed.
    #[error("Image error. {0}")]
    ImageError(#[from] ImageError),

    /// A file could not be stored or read.
    #[error("Storage error. {0}")]
    StorageError(#[from] StorageError),

    /// The ledger could not be updated.
    #[error("Ledger error. {0}")]
    LedgerError(#[from] LedgerError),

    /// A blocking worker panicked or was cancelled.
    #[error("Worker error. {0}")]
    WorkerError(String),
}

impl From<tokio::task::JoinError> for PipelineCause {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineCause::WorkerError(e.to_string())
    }
}

/// A failed colorization request: the step being entered and the cause.
///
/// When the failure happened after the pending row was created, `result` holds that row,
/// already marked failed.
#[derive(thiserror::Error, Debug)]
#[error("Colorization failed at step '{stage}'. {cause}")]
pub struct PipelineError {
    /// The step being entered when the failure happened.
    pub stage: PipelineStage,
    /// What went wrong.
    #[source]
    pub cause: PipelineCause,
    /// The failed ledger row, if one was created.
    pub result: Option<Box<ColorizationResult>>,
}

impl PipelineError {
    /// A failure without a ledger row.
    pub fn new(stage: PipelineStage, cause: impl Into<PipelineCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
            result: None,
        }
    }

    /// Attach the failed ledger row.
    pub fn with_result(mut self, result: ColorizationResult) -> Self {
        self.result = Some(Box::new(result));
        self
    }

    /// Whether the failure is a rejected upload.
    pub fn is_invalid_upload(&self) -> bool {
        matches!(self.cause, PipelineCause::InvalidUpload(_))
    }

    /// Whether the failure is caused by a missing model.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self.cause,
            PipelineCause::InferenceError(DnnError::ModelUnavailable(_))
        )
    }
}
