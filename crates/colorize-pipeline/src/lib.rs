#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Turn a decoded RGB image into its colorized counterpart.
pub mod colorizer;

/// Error types of the pipeline and its collaborators.
pub mod error;

/// SQLite-backed history of uploads and colorization results.
pub mod ledger;

/// Orchestration of a colorization request, from upload to ledger row.
pub mod pipeline;

/// Owner-scoped file storage for sources and results.
pub mod storage;

/// Pure checks on uploaded bytes before anything is stored.
pub mod validator;

pub use crate::error::{
    InvalidUpload, LedgerError, PipelineCause, PipelineError, StorageError,
};
pub use crate::ledger::{ColorizationResult, Ledger, PipelineStage, ProcessingStatus, UploadedImage};
pub use crate::pipeline::{Pipeline, PipelineSettings, Upload};
pub use crate::storage::ImageStore;
pub use crate::validator::{validate, UploadLimits, ValidatedUpload};
