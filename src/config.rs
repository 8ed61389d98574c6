//! Configuration management for recorder-vault
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub jobs: JobsConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for access tokens
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

// Keeps the secret out of debug logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

impl AuthConfig {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_ttl_secs)
    }
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the content-addressed tree (UPLOAD_DIR)
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Background job intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub token_purge_interval_secs: u64,
    pub temp_sweep_interval_secs: u64,
}

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 5 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;
/// Longest accepted token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 3600;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/recorder.sqlite"));
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl_secs = env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS);
        let refresh_token_ttl_secs = env::var("REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_SECS);

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/uploads"));
        let max_upload_bytes = env::var("UPLOAD_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let token_purge_interval_secs = env::var("TOKEN_PURGE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);
        let temp_sweep_interval_secs = env::var("TEMP_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(21600);

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            database: DatabaseConfig {
                path: database_path,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl_secs,
                refresh_token_ttl_secs,
            },
            storage: StorageConfig {
                upload_dir,
                max_upload_bytes,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
            jobs: JobsConfig {
                token_purge_interval_secs,
                temp_sweep_interval_secs,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_token_ttl_secs <= 0
            || self.authentication.refresh_token_ttl_secs <= 0
        {
            return Err(AppError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        if self.authentication.access_token_ttl_secs > MAX_TOKEN_TTL_SECS
            || self.authentication.refresh_token_ttl_secs > MAX_TOKEN_TTL_SECS
        {
            return Err(AppError::Validation(format!(
                "Token lifetimes must be at most {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(AppError::Validation(
                "Upload limit must be greater than zero".to_string(),
            ));
        }

        if self.jobs.token_purge_interval_secs == 0 || self.jobs.temp_sweep_interval_secs == 0 {
            return Err(AppError::Validation(
                "Job intervals must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Config used by unit tests: in-memory defaults rooted at `upload_dir`
    #[cfg(test)]
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-at-least-32-bytes-long".to_string(),
                access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
                refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            },
            storage: StorageConfig {
                upload_dir,
                max_upload_bytes: 1024 * 1024,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Text,
            },
            jobs: JobsConfig {
                token_purge_interval_secs: 3600,
                temp_sweep_interval_secs: 21600,
            },
        }
    }
}
