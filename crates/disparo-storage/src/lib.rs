//! Disparo Storage Library
//!
//! Object-storage gateway for the dispatch engine: the [`ObjectStorage`]
//! trait plus S3-compatible and local-filesystem backends.
//!
//! # Buckets and keys
//!
//! Buckets are per-tenant, derived from the sanitized company name. Asset
//! keys are `disparos/{timestamp_millis}-{sanitized_stem}.{ext}`; the
//! millisecond timestamp makes keys practically unique, so a key is never
//! written twice except by the sequential chunk path. Keys must not contain
//! `..` or a leading `/`. Key generation is centralized in the `keys` module
//! so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use disparo_core::StorageBackend;
pub use factory::create_storage;
pub use keys::asset_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectStorage, StorageError, StorageResult};
