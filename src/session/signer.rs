//! Stateless HS256 access tokens
use crate::{config::AuthConfig, db::models::AccountId};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies access tokens with a key fixed at construction
///
/// Verification never touches the database, so an issued token stays valid
/// until `exp` no matter what happens to the session that produced it.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock reading in verify_at.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token for `subject` valid for `ttl` from now
    pub fn issue(&self, subject: AccountId, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(subject, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: AccountId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str) -> Result<AccountId, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify against an explicit clock reading
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccountId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims
            .sub
            .parse::<i64>()
            .map(AccountId)
            .map_err(|_| TokenError::Malformed("subject is not an account id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer_with(secret: &str) -> TokenSigner {
        TokenSigner::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 604800,
        })
    }

    fn signer() -> TokenSigner {
        signer_with("test-secret-that-is-at-least-32-bytes-long")
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = signer();
        let token = signer.issue(AccountId(42), Duration::minutes(5)).unwrap();

        assert_eq!(signer.verify(&token).unwrap(), AccountId(42));
    }

    #[test]
    fn test_expires_after_ttl() {
        let signer = signer();
        let issued = Utc::now();
        let token = signer
            .issue_at(AccountId(7), Duration::minutes(5), issued)
            .unwrap();

        assert!(signer
            .verify_at(&token, issued + Duration::minutes(4))
            .is_ok());
        assert_eq!(
            signer.verify_at(&token, issued + Duration::minutes(5)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            signer.verify_at(&token, issued + Duration::hours(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_unrepresentable_expiry_is_error() {
        let result = signer().issue(AccountId(1), Duration::days(365_000_000));

        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = signer().issue(AccountId(1), Duration::minutes(5)).unwrap();
        let other = signer_with("another-secret-that-is-also-32-bytes-long");

        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_wrong_algorithm_rejected() {
        let secret = "test-secret-that-is-at-least-32-bytes-long";
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".to_string(),
            iat: now,
            exp: now + 300,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(signer().verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            signer().verify("definitely.not.ajwt"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(signer().verify(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_non_numeric_subject_is_malformed() {
        let secret = "test-secret-that-is-at-least-32-bytes-long";
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "did:web:example".to_string(),
            iat: now,
            exp: now + 300,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            signer().verify(&token),
            Err(TokenError::Malformed(_))
        ));
    }
}
