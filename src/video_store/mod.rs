//! Video storage
//!
//! Uploaded files are stored once per distinct content under a path derived
//! from their SHA-256 digest. Metadata rows in `videos` reference the digest,
//! so any number of uploads can share one file on disk.

pub mod disk;
pub mod models;
pub mod store;

pub use disk::DiskArtifactStore;
pub use models::*;
pub use store::VideoStore;
