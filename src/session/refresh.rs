//! Opaque refresh tokens persisted as SHA-256 digests
use crate::{
    crypto::sha256_hex,
    db::models::{AccountId, RefreshTokenRecord},
    session::signer::{TokenError, TokenSigner},
};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

/// Number of random bytes behind each refresh secret
const SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("invalid refresh token")]
    InvalidToken,
    #[error("refresh token expired")]
    TokenExpired,
    #[error("refresh token lifetime out of range")]
    ExpiryOutOfRange,
    #[error("refresh token persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error(transparent)]
    Signer(#[from] TokenError),
}

pub type RefreshResult<T> = Result<T, RefreshError>;

/// Refresh token store
///
/// The raw secret leaves this type exactly once, as the return value of
/// [`RefreshTokenStore::issue`]. Only its digest is written to the database.
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: SqlitePool,
    signer: Arc<TokenSigner>,
}

impl RefreshTokenStore {
    pub fn new(db: SqlitePool, signer: Arc<TokenSigner>) -> Self {
        Self { db, signer }
    }

    /// Issue a new refresh secret for `account`, valid for `ttl`
    pub async fn issue(&self, account: AccountId, ttl: Duration) -> RefreshResult<String> {
        self.issue_at(account, ttl, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        account: AccountId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> RefreshResult<String> {
        let raw = generate_secret();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(RefreshError::ExpiryOutOfRange)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, hashed_token, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(account)
        .bind(sha256_hex(&raw))
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::debug!(%account, %expires_at, "refresh token issued");

        Ok(raw)
    }

    /// Check that `raw` is a live refresh token belonging to `account`
    pub async fn validate(&self, account: AccountId, raw: &str) -> RefreshResult<()> {
        self.validate_at(account, raw, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        account: AccountId,
        raw: &str,
        now: DateTime<Utc>,
    ) -> RefreshResult<()> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, hashed_token, expires_at, created_at
             FROM refresh_tokens
             WHERE user_id = ?1 AND hashed_token = ?2
             LIMIT 1",
        )
        .bind(account)
        .bind(sha256_hex(raw))
        .fetch_optional(&self.db)
        .await?
        .ok_or(RefreshError::InvalidToken)?;

        if !record.is_live_at(now) {
            return Err(RefreshError::TokenExpired);
        }

        Ok(())
    }

    /// Exchange a live refresh token for a new access token
    ///
    /// The presented refresh token is left untouched and keeps working
    /// until its original expiry.
    pub async fn rotate(
        &self,
        account: AccountId,
        raw: &str,
        access_ttl: Duration,
    ) -> RefreshResult<String> {
        self.rotate_at(account, raw, access_ttl, Utc::now()).await
    }

    pub async fn rotate_at(
        &self,
        account: AccountId,
        raw: &str,
        access_ttl: Duration,
        now: DateTime<Utc>,
    ) -> RefreshResult<String> {
        self.validate_at(account, raw, now).await?;
        Ok(self.signer.issue_at(account, access_ttl, now)?)
    }

    /// Resolve the account owning `raw` without knowing it up front
    pub async fn owner_of(&self, raw: &str) -> RefreshResult<AccountId> {
        self.owner_of_at(raw, Utc::now()).await
    }

    pub async fn owner_of_at(&self, raw: &str, now: DateTime<Utc>) -> RefreshResult<AccountId> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT id, user_id, hashed_token, expires_at, created_at
             FROM refresh_tokens
             WHERE hashed_token = ?1
             LIMIT 1",
        )
        .bind(sha256_hex(raw))
        .fetch_optional(&self.db)
        .await?
        .ok_or(RefreshError::InvalidToken)?;

        if !record.is_live_at(now) {
            return Err(RefreshError::TokenExpired);
        }

        Ok(record.user_id)
    }

    /// Delete every token whose expiry is at or before `now`
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> RefreshResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

/// 32 bytes from the OS CSPRNG, hex-encoded
fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
