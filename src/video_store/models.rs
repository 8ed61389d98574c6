//! Video storage data models
use crate::{
    db::models::VideoId,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use sha2::{digest::Output, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Lowercase hex SHA-256 of an artifact's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub const HEX_LEN: usize = 64;

    pub fn from_digest(digest: Output<Sha256>) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a stored hash; must be 64 lowercase hex characters
    pub fn parse(value: &str) -> AppResult<Self> {
        let well_formed = value.len() == Self::HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if !well_formed {
            return Err(AppError::Validation(format!(
                "Invalid content hash: {}",
                value
            )));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of streaming one upload to disk
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub content_hash: ContentHash,
    pub storage_path: PathBuf,
    pub size: u64,
    /// The derived path already held this content; nothing new was written
    pub deduplicated: bool,
}

/// Result of a complete upload: file on disk plus its metadata row
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub artifact_id: VideoId,
    pub content_hash: ContentHash,
    pub storage_path: PathBuf,
}

/// Upload response body
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: VideoId,
    pub content_hash: ContentHash,
}

impl From<UploadReceipt> for UploadResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            id: receipt.artifact_id,
            content_hash: receipt.content_hash,
        }
    }
}
