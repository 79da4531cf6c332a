use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use colorize::pipeline::{
    InvalidUpload, LedgerError, PipelineCause, PipelineError, StorageError,
};

/// Errors returned by the HTTP handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The request carries no owner identity.
    #[error("Missing or invalid x-owner-id header")]
    MissingOwner,

    /// The multipart body has no `file` field.
    #[error("No file part in the request")]
    MissingFile,

    /// The multipart body could not be read.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// The request did not finish in time.
    #[error("Colorization did not finish within {0} seconds")]
    Timeout(u64),

    /// A colorization request failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A lookup or deletion failed.
    #[error(transparent)]
    Cause(#[from] PipelineCause),

    /// A ledger query failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A background task panicked.
    #[error("Worker error. {0}")]
    Worker(#[from] tokio::task::JoinError),
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AuthorizationError { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn cause_status(cause: &PipelineCause) -> StatusCode {
    match cause {
        PipelineCause::InvalidUpload(InvalidUpload::TooLarge { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        PipelineCause::InvalidUpload(_) => StatusCode::BAD_REQUEST,
        PipelineCause::StorageError(StorageError::InvalidOwner(_)) => StatusCode::BAD_REQUEST,
        PipelineCause::LedgerError(e) => ledger_status(e),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// The status code of the response.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingOwner => StatusCode::UNAUTHORIZED,
            ApiError::MissingFile => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Pipeline(e) if e.is_model_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Pipeline(e) if e.result.is_some() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(e) => cause_status(&e.cause),
            ApiError::Cause(cause) => cause_status(cause),
            ApiError::Ledger(e) => ledger_status(e),
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{status}: {self}");
        } else {
            log::debug!("{status}: {self}");
        }

        let body = match &self {
            ApiError::Pipeline(e) => serde_json::json!({
                "error": self.to_string(),
                "step": e.stage,
                "result": e.result,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
