//! Argon2id password hashing
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::Argon2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("hashing failed: {0}")]
    Hashing(String),
    #[error("stored hash is malformed: {0}")]
    MalformedHash(String),
}

/// One-way credential hasher producing PHC strings
///
/// Uses the argon2 crate's default Argon2id parameters. Verification reads
/// the parameters back out of the stored hash, so digests produced with
/// other parameters still verify.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap parameters so test suites don't spend seconds per hash
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let params = argon2::Params::new(1024, 1, 1, None).unwrap();
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check `plaintext` against a stored digest
    ///
    /// A mismatch is `Ok(false)`; only an unparsable digest is an error.
    pub fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
        }
    }
}
