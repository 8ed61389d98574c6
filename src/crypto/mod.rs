//! Cryptographic primitives: password hashing and SHA-256 digests

pub mod password;

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}
