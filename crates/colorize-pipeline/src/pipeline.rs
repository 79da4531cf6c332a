use std::sync::Arc;

use chrono::Utc;
use colorize_dnn::ModelHandle;
use tokio::sync::Semaphore;
use colorize_io::{
    functional::{decode_image_rgb8, encode_image_rgb8},
    ImageFormat,
};
use uuid::Uuid;

use crate::{
    colorizer::colorize_rgb8,
    error::{InvalidUpload, LedgerError, PipelineCause, PipelineError},
    ledger::{ColorizationResult, Ledger, PipelineStage, UploadedImage},
    storage::ImageStore,
    validator::{validate, UploadLimits},
};

/// Default JPEG quality of encoded results.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Default number of images decoded and colorized at the same time.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;

/// Tunables of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    /// Constraints on uploads.
    pub limits: UploadLimits,
    /// Format of the colorized results.
    pub output_format: ImageFormat,
    /// Quality used when `output_format` is JPEG.
    pub jpeg_quality: u8,
    /// Images decoded and colorized at the same time; further requests wait their turn.
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            output_format: ImageFormat::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

/// An upload as received from a client.
#[derive(Clone, Debug)]
pub struct Upload {
    /// The file content.
    pub bytes: Vec<u8>,
    /// The file name announced by the client.
    pub filename: String,
    /// The content type announced by the client.
    pub declared_content_type: Option<String>,
    /// The size announced by the client.
    pub declared_size: u64,
}

impl Upload {
    /// An upload whose declared size is the size of `bytes`.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let declared_size = bytes.len() as u64;
        Self {
            bytes,
            filename: filename.into(),
            declared_content_type: None,
            declared_size,
        }
    }

    /// Set the content type announced by the client.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.declared_content_type = Some(content_type.into());
        self
    }
}

/// The colorization request pipeline.
///
/// A request walks `received → validated → decoded → inferred → merged → encoded → persisted
/// → succeeded`. Rejected uploads leave nothing behind. Once the pending result row exists,
/// every failure marks it failed with the step being entered and removes any result file.
/// Decoding, inference and encoding run on the blocking thread pool, at most
/// [`PipelineSettings::max_concurrent_jobs`] at a time.
#[derive(Clone, Debug)]
pub struct Pipeline {
    store: ImageStore,
    ledger: Ledger,
    model: ModelHandle,
    settings: Arc<PipelineSettings>,
    jobs: Arc<Semaphore>,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        store: ImageStore,
        ledger: Ledger,
        model: ModelHandle,
        settings: PipelineSettings,
    ) -> Self {
        let jobs = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            store,
            ledger,
            model,
            settings: Arc::new(settings),
            jobs,
        }
    }

    /// The history ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The file storage.
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// The shared model handle.
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// The pipeline settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Validate, store and colorize an upload on behalf of `owner`.
    pub async fn run(
        &self,
        upload: Upload,
        owner: &str,
    ) -> Result<ColorizationResult, PipelineError> {
        log::info!(
            "colorize request from {owner}: {} ({} bytes)",
            upload.filename,
            upload.bytes.len()
        );

        ImageStore::validate_owner(owner)
            .map_err(|e| PipelineError::new(PipelineStage::Received, e))?;

        let validated = validate(
            &upload.bytes,
            upload.declared_content_type.as_deref(),
            upload.declared_size,
            &upload.filename,
            &self.settings.limits,
        )
        .map_err(|e| {
            log::info!("upload from {owner} rejected: {e}");
            PipelineError::new(PipelineStage::Validated, e)
        })?;

        let id = Uuid::new_v4();
        let stored_path = ImageStore::source_path(owner, id, validated.format);

        let store = self.store.clone();
        let path = stored_path.clone();
        let bytes = tokio::task::spawn_blocking(move || {
            store.write(&path, &upload.bytes).map(|_| upload.bytes)
        })
        .await
        .map_err(|e| PipelineError::new(PipelineStage::Validated, e))?
        .map_err(|e| PipelineError::new(PipelineStage::Validated, e))?;

        let image = UploadedImage {
            id,
            owner_id: owner.to_string(),
            stored_path,
            original_filename: validated.original_filename,
            size_bytes: validated.size_bytes as i64,
            content_type: validated.content_type,
            uploaded_at: Utc::now(),
        };

        if let Err(e) = self.ledger.insert_image(&image).await {
            self.store.remove_logged(&image.stored_path);
            return Err(PipelineError::new(PipelineStage::Validated, e));
        }

        let pending = match self.ledger.append_pending(image.id, owner).await {
            Ok(pending) => pending,
            Err(e) => {
                if let Err(e) = self.ledger.remove_image(image.id).await {
                    log::warn!("failed to remove image row {}: {e}", image.id);
                }
                self.store.remove_logged(&image.stored_path);
                return Err(PipelineError::new(PipelineStage::Validated, e));
            }
        };
        log::debug!("{}: validated, stored as {}", pending.id, image.stored_path);

        self.process(pending, bytes).await
    }

    /// Colorize a stored image again, appending a new result row.
    pub async fn rerun(
        &self,
        image_id: Uuid,
        owner: &str,
    ) -> Result<ColorizationResult, PipelineError> {
        log::info!("re-run request from {owner} for image {image_id}");

        let image = self
            .ledger
            .get_image_for(image_id, owner)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Received, e))?;

        let store = self.store.clone();
        let path = image.stored_path.clone();
        let bytes = tokio::task::spawn_blocking(move || store.read(&path))
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Validated, e))?
            .map_err(|e| PipelineError::new(PipelineStage::Validated, e))?;

        let pending = self
            .ledger
            .append_pending(image.id, owner)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Validated, e))?;

        self.process(pending, bytes).await
    }

    async fn process(
        &self,
        pending: ColorizationResult,
        bytes: Vec<u8>,
    ) -> Result<ColorizationResult, PipelineError> {
        let id = pending.id;
        let format = self.settings.output_format;
        let result_path = ImageStore::result_path(&pending.owner_id, id, format);

        // never closed, so acquiring only waits
        let permit = match self.jobs.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                let err = PipelineCause::WorkerError(e.to_string());
                return Err(self.fail(id, PipelineError::new(PipelineStage::Decoded, err)).await);
            }
        };

        let model = self.model.clone();
        let settings = self.settings.clone();
        let encoded = match tokio::task::spawn_blocking(move || {
            let _permit = permit;
            colorize_encoded(&bytes, &model, &settings, id)
        })
        .await
        {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(e)) => return Err(self.fail(id, e).await),
            Err(e) => return Err(self.fail(id, PipelineError::new(PipelineStage::Inferred, e)).await),
        };

        let store = self.store.clone();
        let path = result_path.clone();
        let written = tokio::task::spawn_blocking(move || store.write(&path, &encoded)).await;
        match written {
            Ok(Ok(_)) => log::debug!("{id}: persisted {result_path}"),
            Ok(Err(e)) => {
                return Err(self.fail(id, PipelineError::new(PipelineStage::Persisted, e)).await)
            }
            Err(e) => {
                return Err(self.fail(id, PipelineError::new(PipelineStage::Persisted, e)).await)
            }
        }

        match self.ledger.complete(id, &result_path).await {
            Ok(result) => {
                log::info!("{id}: succeeded, {result_path}");
                Ok(result)
            }
            Err(e) => {
                self.store.remove_logged(&result_path);
                Err(self.fail(id, PipelineError::new(PipelineStage::Succeeded, e)).await)
            }
        }
    }

    /// Record the failure on the pending row and attach the row to the error.
    async fn fail(&self, id: Uuid, err: PipelineError) -> PipelineError {
        match &err.cause {
            PipelineCause::InferenceError(e) => log::error!("{id}: inference failed: {e}"),
            cause => log::warn!("{id}: failed at {}: {cause}", err.stage),
        }

        match self.ledger.fail(id, err.stage, &err.cause.to_string()).await {
            Ok(row) => err.with_result(row),
            Err(e) => {
                log::error!("{id}: failed to record the failure: {e}");
                err
            }
        }
    }

    /// The `limit` newest result rows of `owner`.
    pub async fn history(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<ColorizationResult>, LedgerError> {
        self.ledger.list_recent(owner, limit).await
    }

    /// A result row of `owner`.
    pub async fn result(&self, id: Uuid, owner: &str) -> Result<ColorizationResult, LedgerError> {
        self.ledger.get_result_for(id, owner).await
    }

    /// The encoded result image of a succeeded row, with its content type.
    pub async fn result_image(
        &self,
        id: Uuid,
        owner: &str,
    ) -> Result<(Vec<u8>, &'static str), PipelineCause> {
        let result = self.ledger.get_result_for(id, owner).await?;
        let path = result.result_path.ok_or(LedgerError::NotFound(id))?;

        let mime = path
            .rsplit_once('.')
            .and_then(|(_, ext)| ImageFormat::from_extension(ext))
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");

        let store = self.store.clone();
        let bytes = tokio::task::spawn_blocking(move || store.read(&path)).await??;
        Ok((bytes, mime))
    }

    /// Delete a stored image, its result rows and all their files.
    ///
    /// Rows go first; files that cannot be removed afterwards are logged and left behind.
    pub async fn delete_image(&self, image_id: Uuid, owner: &str) -> Result<(), PipelineCause> {
        let (image, results) = self.ledger.delete_image(image_id, owner).await?;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            for path in results.iter().filter_map(|r| r.result_path.as_deref()) {
                store.remove_logged(path);
            }
            store.remove_logged(&image.stored_path);
        })
        .await?;

        log::info!("deleted image {image_id} of {owner}");
        Ok(())
    }
}

/// Decode, colorize and encode, tagging failures with their step.
fn colorize_encoded(
    bytes: &[u8],
    model: &ModelHandle,
    settings: &PipelineSettings,
    id: Uuid,
) -> Result<Vec<u8>, PipelineError> {
    let decoded = decode_image_rgb8(bytes)
        .map_err(|e| PipelineError::new(PipelineStage::Decoded, PipelineCause::DecodeError(e)))?;

    let size = decoded.size();
    let limits = &settings.limits;
    if size.width > limits.max_width || size.height > limits.max_height {
        return Err(PipelineError::new(
            PipelineStage::Decoded,
            InvalidUpload::DimensionsTooLarge {
                width: size.width,
                height: size.height,
                max_width: limits.max_width,
                max_height: limits.max_height,
            },
        ));
    }
    log::debug!("{id}: decoded {}x{}", size.width, size.height);

    let colorized = colorize_rgb8(&decoded, model)?;
    log::debug!("{id}: inferred and merged with {}", model.describe());

    let encoded = encode_image_rgb8(&colorized, settings.output_format, settings.jpeg_quality)
        .map_err(|e| PipelineError::new(PipelineStage::Encoded, PipelineCause::EncodeError(e)))?;
    log::debug!("{id}: encoded {} bytes", encoded.len());

    Ok(encoded)
}
