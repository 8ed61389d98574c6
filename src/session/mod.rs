//! Session lifecycle: signup, login and refresh
//!
//! A lineage moves from anonymous to authenticated on login (access token +
//! refresh secret), gets new access tokens through refresh, and ends when the
//! refresh secret passes its expiry.

pub mod accounts;
pub mod refresh;
pub mod signer;

use crate::{
    config::AuthConfig,
    crypto::password::PasswordHasher,
    db::models::AccountId,
    error::{AppError, AppResult},
};
use accounts::{AccountField, AccountStore};
use chrono::{DateTime, Duration, Utc};
use refresh::RefreshTokenStore;
use serde::{Deserialize, Serialize};
use signer::TokenSigner;
use sqlx::SqlitePool;
use std::sync::Arc;

const MAX_EMAIL_LEN: usize = 255;
const MAX_USERNAME_LEN: usize = 50;
const MIN_USERNAME_LEN: usize = 3;
const MAX_PASSWORD_LEN: usize = 1024;

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Signup response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub id: AccountId,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request
///
/// Without `account_id` the owner is resolved from the token itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    #[serde(default)]
    pub account_id: Option<AccountId>,
}

/// Access token plus the refresh secret that backs it
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// Orchestrates password hashing, access tokens and refresh tokens
pub struct SessionService {
    accounts: AccountStore,
    refresh_tokens: RefreshTokenStore,
    signer: Arc<TokenSigner>,
    hasher: PasswordHasher,
    access_ttl: Duration,
    refresh_ttl: Duration,
    /// Verified against when the email is unknown so both failure paths cost the same
    dummy_hash: String,
}

impl SessionService {
    pub fn new(
        db: SqlitePool,
        signer: Arc<TokenSigner>,
        auth: &AuthConfig,
        hasher: PasswordHasher,
    ) -> AppResult<Self> {
        let dummy_hash = hasher.hash("recorder-vault-dummy-password")?;

        Ok(Self {
            accounts: AccountStore::new(db.clone()),
            refresh_tokens: RefreshTokenStore::new(db, Arc::clone(&signer)),
            signer,
            hasher,
            access_ttl: auth.access_token_ttl(),
            refresh_ttl: auth.refresh_token_ttl(),
            dummy_hash,
        })
    }

    /// Create an account; does not log the caller in
    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> AppResult<AccountId> {
        validate_email(email)?;
        validate_username(username)?;
        validate_password(password)?;

        // Friendlier error in the common case; the insert is the real guard.
        for (field, value) in [(AccountField::Email, email), (AccountField::Username, username)] {
            if self.accounts.exists(field, value).await? {
                return Err(AppError::Conflict(format!(
                    "{} already registered",
                    field.as_str()
                )));
            }
        }

        let password_hash = self.hash_password(password).await?;
        let id = self.accounts.insert(email, username, &password_hash).await?;

        tracing::info!(account = %id, "account created");

        Ok(id)
    }

    /// Verify credentials and open a new session lineage
    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let account = self.accounts.find_by_email(email).await?;
        let (digest, account_id) = match account {
            Some(account) => (account.password_hash, Some(account.id)),
            None => (self.dummy_hash.clone(), None),
        };

        let valid = self.verify_password(digest, password).await?;

        let account_id = match (account_id, valid) {
            (Some(id), true) => id,
            _ => {
                tracing::warn!("login rejected");
                return Err(AppError::Unauthorized("invalid credentials".to_string()));
            }
        };

        let access_token = self.signer.issue(account_id, self.access_ttl)?;
        let refresh_token = self
            .refresh_tokens
            .issue(account_id, self.refresh_ttl)
            .await?;

        tracing::info!(account = %account_id, "login succeeded");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// New access token for a known account; the refresh secret is reused
    pub async fn refresh(&self, account: AccountId, raw_refresh: &str) -> AppResult<TokenPair> {
        require_refresh_token(raw_refresh)?;

        let access_token = self
            .refresh_tokens
            .rotate(account, raw_refresh, self.access_ttl)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token: raw_refresh.to_string(),
        })
    }

    /// Resolve the owner from the refresh secret and issue a fresh pair
    ///
    /// The presented secret is not revoked; it stays usable until its own
    /// expiry alongside the newly issued one.
    pub async fn refresh_with_token(&self, raw_refresh: &str) -> AppResult<TokenPair> {
        require_refresh_token(raw_refresh)?;

        let account = self.refresh_tokens.owner_of(raw_refresh).await?;

        let access_token = self.signer.issue(account, self.access_ttl)?;
        let refresh_token = self.refresh_tokens.issue(account, self.refresh_ttl).await?;

        tracing::debug!(%account, "session refreshed");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Account behind a bearer access token
    pub fn authenticate(&self, access_token: &str) -> AppResult<AccountId> {
        Ok(self.signer.verify(access_token)?)
    }

    /// Drop refresh tokens that expired at or before `now`
    pub async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.refresh_tokens.purge_expired(now).await?)
    }

    async fn hash_password(&self, password: &str) -> AppResult<String> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))??;

        Ok(digest)
    }

    async fn verify_password(&self, digest: String, password: &str) -> AppResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        let valid = tokio::task::spawn_blocking(move || hasher.verify(&digest, &password))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))??;

        Ok(valid)
    }

    #[cfg(test)]
    pub(crate) fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }
}

fn require_refresh_token(raw_refresh: &str) -> AppResult<()> {
    if raw_refresh.is_empty() {
        return Err(AppError::Validation("refresh_token is required".to_string()));
    }

    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::Validation("Invalid email format".to_string()));
    };

    if local.is_empty() || domain.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}

fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }

    if len > MAX_USERNAME_LEN {
        return Err(AppError::Validation("Username too long".to_string()));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(AppError::Validation(
            "Username contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::Validation("Password too long".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 7 * 24 * 3600,
        }
    }

    async fn create_test_service() -> SessionService {
        create_service_with(auth_config()).await
    }

    async fn create_service_with(auth: AuthConfig) -> SessionService {
        let signer = Arc::new(TokenSigner::new(&auth));
        SessionService::new(
            db::memory_pool().await,
            signer,
            &auth,
            PasswordHasher::for_tests(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_login_with_unrepresentable_refresh_expiry_fails_cleanly() {
        let mut auth = auth_config();
        auth.refresh_token_ttl_secs = 10_000_000_000_000;
        let service = create_service_with(auth).await;
        service.signup("a@x.com", "alice", "pw123").await.unwrap();

        assert!(matches!(
            service.login("a@x.com", "pw123").await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_refresh_token_is_validation_error() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();

        assert!(matches!(
            service.refresh(id, "").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.refresh_with_token("").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_login_scenario() {
        let service = create_test_service().await;

        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();

        assert!(matches!(
            service.signup("a@x.com", "alice2", "pw123").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service.signup("b@x.com", "alice", "pw123").await,
            Err(AppError::Conflict(_))
        ));

        let pair = service.login("a@x.com", "pw123").await.unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_eq!(service.authenticate(&pair.access_token).unwrap(), id);

        assert!(matches!(
            service.login("a@x.com", "wrong").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_identical() {
        let service = create_test_service().await;
        service.signup("a@x.com", "alice", "pw123").await.unwrap();

        let unknown = service.login("nobody@x.com", "pw123").await.unwrap_err();
        let wrong = service.login("a@x.com", "nope").await.unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let service = create_test_service().await;
        assert!(matches!(
            service.login("", "pw").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.login("a@x.com", "").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let service = create_test_service().await;

        for (email, username, password) in [
            ("no-at-sign", "alice", "pw"),
            ("@x.com", "alice", "pw"),
            ("a@x.com", "al", "pw"),
            ("a@x.com", "alice smith", "pw"),
            ("a@x.com", "alice", ""),
        ] {
            assert!(
                matches!(
                    service.signup(email, username, password).await,
                    Err(AppError::Validation(_))
                ),
                "accepted {} / {}",
                email,
                username
            );
        }
    }

    #[tokio::test]
    async fn test_password_is_not_stored_raw() {
        let service = create_test_service().await;
        service.signup("a@x.com", "alice", "pw123").await.unwrap();

        let account = service
            .accounts
            .find_by_email("a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(account.password_hash, "pw123");
        assert!(account.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_refresh_reuses_secret() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();
        let pair = service.login("a@x.com", "pw123").await.unwrap();

        let refreshed = service.refresh(id, &pair.refresh_token).await.unwrap();
        assert_eq!(refreshed.refresh_token, pair.refresh_token);
        assert_eq!(service.authenticate(&refreshed.access_token).unwrap(), id);

        // Still valid after a legitimate refresh.
        assert!(service.refresh(id, &pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_wrong_secret_is_unauthorized() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();
        service.login("a@x.com", "pw123").await.unwrap();

        assert!(matches!(
            service.refresh(id, "not-a-token").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_expired_token_is_unauthorized() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();

        let issued = Utc::now() - Duration::days(8);
        let raw = service
            .refresh_tokens()
            .issue_at(id, Duration::days(7), issued)
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(id, &raw).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.refresh_with_token(&raw).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_with_token_issues_new_pair() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();
        let pair = service.login("a@x.com", "pw123").await.unwrap();

        let next = service.refresh_with_token(&pair.refresh_token).await.unwrap();
        assert_ne!(next.refresh_token, pair.refresh_token);
        assert_eq!(service.authenticate(&next.access_token).unwrap(), id);

        // Both secrets remain usable.
        service.refresh(id, &pair.refresh_token).await.unwrap();
        service.refresh(id, &next.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_purge_expired_refresh_tokens() {
        let service = create_test_service().await;
        let id = service.signup("a@x.com", "alice", "pw123").await.unwrap();
        let now = Utc::now();
        service
            .refresh_tokens()
            .issue_at(id, Duration::days(7), now - Duration::days(8))
            .await
            .unwrap();
        service.login("a@x.com", "pw123").await.unwrap();

        assert_eq!(service.purge_expired_refresh_tokens(now).await.unwrap(), 1);
    }
}
