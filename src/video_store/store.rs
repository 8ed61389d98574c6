//! Video store: content-addressed files plus metadata rows
use crate::{
    config::StorageConfig,
    db::models::{AccountId, Video, VideoId},
    error::{AppError, AppResult},
    video_store::{ContentHash, DiskArtifactStore, IngestedFile, UploadReceipt},
};
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Longest accepted video title, in characters
const MAX_TITLE_LEN: usize = 255;

/// Video store
#[derive(Clone)]
pub struct VideoStore {
    disk: DiskArtifactStore,
    db: SqlitePool,
}

impl VideoStore {
    pub fn new(config: &StorageConfig, db: SqlitePool) -> Self {
        Self {
            disk: DiskArtifactStore::new(config.upload_dir.clone(), config.max_upload_bytes),
            db,
        }
    }

    pub async fn ensure_directories(&self) -> AppResult<()> {
        self.disk.ensure_directories().await
    }

    /// Stream an upload to disk and record it for `owner`
    ///
    /// The title is checked before any bytes are written and the metadata
    /// row only after the file is in place, so a failed upload never leaves
    /// a row pointing at nothing.
    pub async fn upload<R>(
        &self,
        owner: AccountId,
        title: &str,
        reader: R,
        original_filename: &str,
    ) -> AppResult<UploadReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_title(title)?;
        let ingested = self.ingest(reader, original_filename).await?;
        self.record_ingested(owner, title, ingested).await
    }

    /// Stream an upload to disk without recording it
    pub async fn ingest<R>(&self, reader: R, original_filename: &str) -> AppResult<IngestedFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.disk.ingest(reader, original_filename).await
    }

    /// Record a file that is already in place under `title`
    pub async fn record_ingested(
        &self,
        owner: AccountId,
        title: &str,
        ingested: IngestedFile,
    ) -> AppResult<UploadReceipt> {
        let title = validate_title(title)?;
        let artifact_id = self.record(owner, title, &ingested.content_hash).await?;

        tracing::info!(
            %owner,
            video_id = %artifact_id,
            hash = %ingested.content_hash,
            size = ingested.size,
            deduplicated = ingested.deduplicated,
            "video uploaded"
        );

        Ok(UploadReceipt {
            artifact_id,
            content_hash: ingested.content_hash,
            storage_path: ingested.storage_path,
        })
    }

    /// Insert a metadata row for already-stored content
    pub async fn record(
        &self,
        owner: AccountId,
        title: &str,
        hash: &ContentHash,
    ) -> AppResult<VideoId> {
        let id = sqlx::query_scalar::<_, VideoId>(
            "INSERT INTO videos (owner_id, title, video_hash)
             VALUES (?1, ?2, ?3)
             RETURNING id",
        )
        .bind(owner)
        .bind(title)
        .bind(hash.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: VideoId) -> AppResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(
            "SELECT id, owner_id, title, video_hash FROM videos WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(video)
    }

    /// Remove abandoned staging files; returns how many were deleted
    pub async fn sweep_stale_uploads(&self, max_age: Duration) -> AppResult<u64> {
        self.disk.sweep_stale_temp_files(max_age).await
    }
}

fn validate_title(title: &str) -> AppResult<&str> {
    let title = title.trim();

    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }

    Ok(title)
}
