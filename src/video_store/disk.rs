//! Content-addressed disk storage
use crate::{
    error::{AppError, AppResult},
    video_store::{ContentHash, IngestedFile},
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Read buffer for streaming uploads
const CHUNK_SIZE: usize = 64 * 1024;

/// Longest accepted file extension, without the dot
const MAX_EXTENSION_LEN: usize = 16;

/// Name of the staging directory under the upload root
const TEMP_DIR_NAME: &str = ".tmp";

/// Storage path for an artifact
///
/// Four levels of directory sharding keyed by the first four hex characters
/// of the hash: `{root}/{h0}/{h1}/{h2}/{h3}/{hash}{ext}`. For example hash
/// "ab12..." with ".mp4" -> `{root}/a/b/1/2/ab12....mp4`.
pub fn storage_path(root: &Path, hash: &ContentHash, extension: &str) -> PathBuf {
    let h = hash.as_str();
    root.join(&h[0..1])
        .join(&h[1..2])
        .join(&h[2..3])
        .join(&h[3..4])
        .join(format!("{}{}", h, extension))
}

/// Extension of `filename` including the leading dot, or "" when absent
pub fn extension_of(filename: &str) -> AppResult<String> {
    let Some(ext) = Path::new(filename).extension() else {
        return Ok(String::new());
    };

    let ext = ext
        .to_str()
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .ok_or_else(|| AppError::Validation("Unsupported file extension".to_string()))?;

    Ok(format!(".{}", ext))
}

/// Disk storage backend
///
/// Uploads are staged in `{root}/.tmp` while being hashed, then moved to
/// their content-derived location. A file already at that location is
/// trusted to hold the same bytes and is left alone.
#[derive(Debug, Clone)]
pub struct DiskArtifactStore {
    root: PathBuf,
    temp_dir: PathBuf,
    max_bytes: u64,
}

impl DiskArtifactStore {
    pub fn new(root: PathBuf, max_bytes: u64) -> Self {
        let temp_dir = root.join(TEMP_DIR_NAME);
        Self {
            root,
            temp_dir,
            max_bytes,
        }
    }

    /// Create the upload root and staging directory
    pub async fn ensure_directories(&self) -> AppResult<()> {
        create_dir_all(&self.temp_dir).await
    }

    pub fn path_for(&self, hash: &ContentHash, extension: &str) -> PathBuf {
        storage_path(&self.root, hash, extension)
    }

    /// Stream `reader` to disk, hashing as it goes
    pub async fn ingest<R>(&self, reader: R, original_filename: &str) -> AppResult<IngestedFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let extension = extension_of(original_filename)?;

        create_dir_all(&self.temp_dir).await?;
        let temp_path = self.temp_dir.join(format!("{}.part", Uuid::new_v4()));

        let outcome = match self.write_temp(reader, &temp_path).await {
            Ok((content_hash, size)) => {
                let storage_path = self.path_for(&content_hash, &extension);
                self.place(&temp_path, &storage_path)
                    .await
                    .map(|deduplicated| IngestedFile {
                        content_hash,
                        storage_path,
                        size,
                        deduplicated,
                    })
            }
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            discard(&temp_path).await;
        }

        let ingested = outcome?;
        tracing::debug!(
            hash = %ingested.content_hash,
            size = ingested.size,
            deduplicated = ingested.deduplicated,
            "ingested upload"
        );

        Ok(ingested)
    }

    async fn write_temp<R>(&self, mut reader: R, temp_path: &Path) -> AppResult<(ContentHash, u64)>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut file = fs::File::create(temp_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", temp_path.display(), e))
        })?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut size: u64 = 0;

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to read upload: {}", e)))?;
            if n == 0 {
                break;
            }

            size += n as u64;
            if size > self.max_bytes {
                return Err(AppError::Validation(format!(
                    "Upload exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }

            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await.map_err(|e| {
                AppError::Storage(format!("Failed to write {}: {}", temp_path.display(), e))
            })?;
        }

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            AppError::Storage(format!("Failed to sync {}: {}", temp_path.display(), e))
        })?;

        Ok((ContentHash::from_digest(hasher.finalize()), size))
    }

    /// Move a finished temp file into place; true when it was already there
    async fn place(&self, temp_path: &Path, storage_path: &Path) -> AppResult<bool> {
        if let Some(parent) = storage_path.parent() {
            create_dir_all(parent).await?;
        }

        if fs::try_exists(storage_path).await? {
            discard(temp_path).await;
            return Ok(true);
        }

        fs::rename(temp_path, storage_path).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to move upload to {}: {}",
                storage_path.display(),
                e
            ))
        })?;

        Ok(false)
    }

    /// Remove staging files older than `max_age`, left behind by interrupted uploads
    pub async fn sweep_stale_temp_files(&self, max_age: Duration) -> AppResult<u64> {
        let mut entries = match fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified()?;
            if modified <= cutoff {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!(
                        path = %entry.path().display(),
                        "failed to remove stale upload: {}",
                        e
                    ),
                }
            }
        }

        Ok(removed)
    }
}

async fn create_dir_all(path: &Path) -> AppResult<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o750);

    builder.create(path).await.map_err(|e| {
        AppError::Storage(format!("Failed to create directory {}: {}", path.display(), e))
    })
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "failed to remove temp file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn hash(s: &str) -> ContentHash {
        ContentHash::parse(s).unwrap()
    }

    #[test]
    fn test_storage_path_sharding() {
        let root = Path::new("/srv/uploads");
        let path = storage_path(root, &hash(EMPTY_SHA256), ".mp4");

        assert_eq!(
            path,
            PathBuf::from(format!("/srv/uploads/e/3/b/0/{}.mp4", EMPTY_SHA256))
        );
    }

    #[test]
    fn test_storage_path_is_deterministic() {
        let root = Path::new("/srv/uploads");
        let h = hash(EMPTY_SHA256);

        assert_eq!(storage_path(root, &h, ".webm"), storage_path(root, &h, ".webm"));
        assert_ne!(storage_path(root, &h, ".webm"), storage_path(root, &h, ".mp4"));
        assert_eq!(
            storage_path(root, &h, "").file_name().unwrap(),
            EMPTY_SHA256
        );
    }

    #[test]
    fn test_same_prefix_same_directory() {
        let root = Path::new("/srv/uploads");
        let a = hash(&format!("abcd{}", "0".repeat(60)));
        let b = hash(&format!("abcd{}", "f".repeat(60)));

        assert_eq!(
            storage_path(root, &a, ".mp4").parent(),
            storage_path(root, &b, ".mp4").parent()
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("clip.mp4").unwrap(), ".mp4");
        assert_eq!(extension_of("archive.tar.gz").unwrap(), ".gz");
        assert_eq!(extension_of("../../etc/clip.webm").unwrap(), ".webm");
        assert_eq!(extension_of("no_extension").unwrap(), "");
        assert_eq!(extension_of("").unwrap(), "");
        assert!(extension_of("clip.mp4;rm").is_err());
        assert!(extension_of("clip.averyveryverylongextension").is_err());
    }

    #[tokio::test]
    async fn test_ingest_twice_same_path() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 1024);
        let data = b"recorded frames".to_vec();

        let first = store.ingest(data.as_slice(), "a.mp4").await.unwrap();
        let second = store.ingest(data.as_slice(), "b.mp4").await.unwrap();

        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.storage_path, second.storage_path);
        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(fs::read(&first.storage_path).await.unwrap(), data);
        assert_eq!(first.content_hash.as_str(), crate::crypto::sha256_hex(&data));
    }

    #[tokio::test]
    async fn test_ingest_empty_file() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 1024);

        let ingested = store.ingest(&b""[..], "empty.mp4").await.unwrap();

        assert_eq!(ingested.content_hash.as_str(), EMPTY_SHA256);
        assert_eq!(ingested.size, 0);
        assert!(ingested.storage_path.exists());
        assert!(ingested.storage_path.starts_with(dir.path().join("e/3/b/0")));
    }

    #[tokio::test]
    async fn test_ingest_streams_larger_than_chunk() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 1024 * 1024);
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();

        let ingested = store.ingest(data.as_slice(), "big.bin").await.unwrap();

        assert_eq!(ingested.size, data.len() as u64);
        assert_eq!(ingested.content_hash.as_str(), crate::crypto::sha256_hex(&data));
    }

    #[tokio::test]
    async fn test_oversized_upload_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 8);

        let result = store.ingest(&b"more than eight bytes"[..], "x.mp4").await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let mut staged = fs::read_dir(dir.path().join(TEMP_DIR_NAME)).await.unwrap();
        assert!(staged.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_extension_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 1024);

        let result = store.ingest(&b"data"[..], "clip.m p4").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!dir.path().join(TEMP_DIR_NAME).exists());
    }

    #[tokio::test]
    async fn test_sweep_stale_temp_files() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().to_path_buf(), 1024);
        store.ensure_directories().await.unwrap();
        fs::write(dir.path().join(TEMP_DIR_NAME).join("orphan.part"), b"x")
            .await
            .unwrap();

        assert_eq!(
            store
                .sweep_stale_temp_files(Duration::from_secs(3600))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store.sweep_stale_temp_files(Duration::ZERO).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_sweep_without_temp_dir() {
        let dir = tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().join("missing"), 1024);

        assert_eq!(
            store.sweep_stale_temp_files(Duration::ZERO).await.unwrap(),
            0
        );
    }
}
