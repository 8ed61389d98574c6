//! Account persistence
use crate::{
    db::models::{Account, AccountId},
    error::{AppError, AppResult},
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Columns that signup checks for uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    Email,
    Username,
}

impl AccountField {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountField::Email => "email",
            AccountField::Username => "username",
        }
    }

    fn exists_query(self) -> &'static str {
        match self {
            AccountField::Email => "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            AccountField::Username => "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        }
    }
}

/// Account store backed by the `users` table
#[derive(Clone)]
pub struct AccountStore {
    db: SqlitePool,
}

impl AccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Whether any account already uses `value` for `field`
    pub async fn exists(&self, field: AccountField, value: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(field.exists_query())
            .bind(value)
            .fetch_one(&self.db)
            .await?;

        Ok(exists)
    }

    /// Insert a new account
    ///
    /// The UNIQUE constraints decide conflicts; a violation surfaces as
    /// `Conflict` even if an earlier `exists` check passed.
    pub async fn insert(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> AppResult<AccountId> {
        let result = sqlx::query_scalar::<_, AccountId>(
            "INSERT INTO users (email, username, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let field = if db_err.message().contains("users.username") {
                    AccountField::Username
                } else {
                    AccountField::Email
                };
                Err(AppError::Conflict(format!(
                    "{} already registered",
                    field.as_str()
                )))
            }
            Err(e) => Err(AppError::Persistence(e)),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, username, password_hash, created_at
             FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }
}
