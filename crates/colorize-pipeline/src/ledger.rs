use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use uuid::Uuid;

use crate::error::LedgerError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS uploaded_images (
        id BLOB PRIMARY KEY NOT NULL,
        owner_id TEXT NOT NULL,
        stored_path TEXT NOT NULL UNIQUE,
        original_filename TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        content_type TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS colorization_results (
        id BLOB PRIMARY KEY NOT NULL,
        source_image_id BLOB NOT NULL REFERENCES uploaded_images(id) ON DELETE CASCADE,
        owner_id TEXT NOT NULL,
        result_path TEXT UNIQUE,
        processing_status TEXT NOT NULL
            CHECK (processing_status IN ('pending', 'succeeded', 'failed')),
        failed_step TEXT,
        failure_reason TEXT,
        created_at TEXT NOT NULL,
        completed_at TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_results_owner_created
        ON colorization_results (owner_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_results_source
        ON colorization_results (source_image_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_owner ON uploaded_images (owner_id)",
];

/// Lifecycle of a colorization result row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// The pipeline is running.
    Pending,
    /// A result file exists at `result_path`.
    Succeeded,
    /// The pipeline stopped at `failed_step`.
    Failed,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Succeeded => "succeeded",
            ProcessingStatus::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Steps of a colorization request, in order.
///
/// A failure is recorded with the step that was being entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PipelineStage {
    /// The upload arrived.
    Received,
    /// The upload passed validation and the source is stored.
    Validated,
    /// The bytes were decoded to RGB.
    Decoded,
    /// The model predicted chrominance.
    Inferred,
    /// Luminance and chrominance were recombined to RGB.
    Merged,
    /// The result was encoded.
    Encoded,
    /// The result file was written.
    Persisted,
    /// The result row was marked succeeded.
    Succeeded,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Decoded => "decoded",
            PipelineStage::Inferred => "inferred",
            PipelineStage::Merged => "merged",
            PipelineStage::Encoded => "encoded",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Succeeded => "succeeded",
        };
        write!(f, "{name}")
    }
}

/// A stored source image.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct UploadedImage {
    /// Row id, also the stored file stem.
    pub id: Uuid,
    /// Owner of the image.
    pub owner_id: String,
    /// Path relative to the storage root.
    pub stored_path: String,
    /// File name as sent by the client.
    pub original_filename: String,
    /// Size of the stored file in bytes.
    pub size_bytes: i64,
    /// Sniffed content type.
    pub content_type: String,
    /// When the upload was stored.
    pub uploaded_at: DateTime<Utc>,
}

/// One colorization attempt of a source image.
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct ColorizationResult {
    /// Row id, also the result file stem.
    pub id: Uuid,
    /// The colorized source image.
    pub source_image_id: Uuid,
    /// Owner of the source image.
    pub owner_id: String,
    /// Path of the result relative to the storage root, once succeeded.
    pub result_path: Option<String>,
    /// Current status.
    pub processing_status: ProcessingStatus,
    /// Step being entered when the attempt failed.
    pub failed_step: Option<PipelineStage>,
    /// Human readable cause of the failure.
    pub failure_reason: Option<String>,
    /// When the attempt started.
    pub created_at: DateTime<Utc>,
    /// When the attempt reached a final status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ColorizationResult {
    /// A fresh pending attempt.
    pub fn pending(source_image_id: Uuid, owner_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_image_id,
            owner_id: owner_id.to_string(),
            result_path: None,
            processing_status: ProcessingStatus::Pending,
            failed_step: None,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Append-only history of uploads and colorization attempts.
///
/// Result rows are inserted as pending and updated exactly once to succeeded or failed.
#[derive(Clone, Debug)]
pub struct Ledger {
    pool: Pool<Sqlite>,
}

impl Ledger {
    /// Open the database at `path`, creating it and its schema if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        // one writer at a time; concurrent transactions would fail with "database is locked"
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let ledger = Self { pool };
        ledger.migrate().await?;

        log::info!("ledger opened at {}", path.display());

        Ok(ledger)
    }

    /// Create the tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Check the database answers.
    pub async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every connection of the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a stored source image.
    pub async fn insert_image(&self, image: &UploadedImage) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO uploaded_images
                (id, owner_id, stored_path, original_filename, size_bytes, content_type, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(image.id)
        .bind(&image.owner_id)
        .bind(&image.stored_path)
        .bind(&image.original_filename)
        .bind(image.size_bytes)
        .bind(&image.content_type)
        .bind(image.uploaded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a result row as is.
    pub async fn record(&self, result: &ColorizationResult) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO colorization_results
                (id, source_image_id, owner_id, result_path, processing_status,
                 failed_step, failure_reason, created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(result.id)
        .bind(result.source_image_id)
        .bind(&result.owner_id)
        .bind(&result.result_path)
        .bind(result.processing_status)
        .bind(result.failed_step)
        .bind(&result.failure_reason)
        .bind(result.created_at)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a pending attempt for a stored image.
    pub async fn append_pending(
        &self,
        source_image_id: Uuid,
        owner_id: &str,
    ) -> Result<ColorizationResult, LedgerError> {
        let result = ColorizationResult::pending(source_image_id, owner_id);
        self.record(&result).await?;
        Ok(result)
    }

    /// Mark a pending attempt succeeded with its result path.
    pub async fn complete(
        &self,
        id: Uuid,
        result_path: &str,
    ) -> Result<ColorizationResult, LedgerError> {
        let query = sqlx::query(
            "UPDATE colorization_results
             SET processing_status = ?, result_path = ?, completed_at = ?
             WHERE id = ? AND processing_status = ?",
        )
        .bind(ProcessingStatus::Succeeded)
        .bind(result_path)
        .bind(Utc::now())
        .bind(id)
        .bind(ProcessingStatus::Pending);

        self.finalize(id, query).await
    }

    /// Mark a pending attempt failed at `stage`.
    pub async fn fail(
        &self,
        id: Uuid,
        stage: PipelineStage,
        reason: &str,
    ) -> Result<ColorizationResult, LedgerError> {
        let query = sqlx::query(
            "UPDATE colorization_results
             SET processing_status = ?, failed_step = ?, failure_reason = ?, completed_at = ?
             WHERE id = ? AND processing_status = ?",
        )
        .bind(ProcessingStatus::Failed)
        .bind(stage)
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .bind(ProcessingStatus::Pending);

        self.finalize(id, query).await
    }

    async fn finalize<'q>(
        &self,
        id: Uuid,
        update: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<ColorizationResult, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let updated = update.execute(&mut *tx).await?.rows_affected();

        let row = sqlx::query_as::<_, ColorizationResult>(
            "SELECT * FROM colorization_results WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        match row {
            None => Err(LedgerError::NotFound(id)),
            Some(_) if updated == 0 => Err(LedgerError::AlreadyFinalized(id)),
            Some(row) => Ok(row),
        }
    }

    /// Stream the result rows of an owner, newest first.
    ///
    /// The stream is lazy and finite; calling again starts over. It holds the pool's
    /// connection until dropped, so drain it before issuing other queries.
    pub fn list_for(&self, owner_id: &str) -> BoxStream<'_, Result<ColorizationResult, LedgerError>> {
        sqlx::query_as::<_, ColorizationResult>(
            "SELECT * FROM colorization_results
             WHERE owner_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(owner_id.to_string())
        .fetch(&self.pool)
        .map_err(LedgerError::from)
        .boxed()
    }

    /// The `limit` newest result rows of an owner.
    pub async fn list_recent(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<ColorizationResult>, LedgerError> {
        self.list_for(owner_id).take(limit).try_collect().await
    }

    /// Fetch a result row on behalf of `owner_id`.
    pub async fn get_result_for(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<ColorizationResult, LedgerError> {
        let row = sqlx::query_as::<_, ColorizationResult>(
            "SELECT * FROM colorization_results WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound(id))?;

        check_owner(id, &row.owner_id, owner_id)?;
        Ok(row)
    }

    /// Fetch a stored image on behalf of `owner_id`.
    pub async fn get_image_for(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<UploadedImage, LedgerError> {
        let row = sqlx::query_as::<_, UploadedImage>("SELECT * FROM uploaded_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        check_owner(id, &row.owner_id, owner_id)?;
        Ok(row)
    }

    /// Every attempt made on a source image, newest first.
    pub async fn results_for_image(
        &self,
        source_image_id: Uuid,
    ) -> Result<Vec<ColorizationResult>, LedgerError> {
        let rows = sqlx::query_as::<_, ColorizationResult>(
            "SELECT * FROM colorization_results
             WHERE source_image_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(source_image_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete an image and all its attempts on behalf of `owner_id`.
    ///
    /// Returns the deleted rows so the caller can remove their files.
    pub async fn delete_image(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<(UploadedImage, Vec<ColorizationResult>), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let image = sqlx::query_as::<_, UploadedImage>("SELECT * FROM uploaded_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound(id))?;
        check_owner(id, &image.owner_id, owner_id)?;

        let results = sqlx::query_as::<_, ColorizationResult>(
            "SELECT * FROM colorization_results WHERE source_image_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM colorization_results WHERE source_image_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM uploaded_images WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((image, results))
    }

    /// Delete a stored image row that has no attempts yet.
    pub async fn remove_image(&self, id: Uuid) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM uploaded_images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn check_owner(id: Uuid, row_owner: &str, owner_id: &str) -> Result<(), LedgerError> {
    if row_owner != owner_id {
        return Err(LedgerError::AuthorizationError {
            id,
            owner: owner_id.to_string(),
        });
    }
    Ok(())
}
