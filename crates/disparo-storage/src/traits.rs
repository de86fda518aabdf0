//! Storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must
//! implement, and the error type the upload manager uses to decide whether a
//! strategy fallback is worth attempting.

use async_trait::async_trait;
use bytes::Bytes;
use disparo_core::StorageBackend;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Chunk write failed: {0}")]
    ChunkFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Transient/server-class failures justify the single Direct→Chunked
    /// fallback. Key and configuration problems are deterministic and do
    /// not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_)
                | StorageError::ChunkFailed(_)
                | StorageError::BackendError(_)
                | StorageError::IoError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object storage gateway.
///
/// All backends (S3-compatible, local filesystem) implement this trait so
/// the upload manager never couples to a provider. Chunk writes to one key
/// are append/upsert operations and are **not** idempotent per chunk:
/// callers must issue them strictly sequentially, in order, with `is_first`
/// set only on the first chunk. Out-of-order or interleaved chunk writes
/// corrupt the object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Single-shot write of a complete payload to `bucket`/`key`.
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Sequential append/upsert write of one chunk. `is_first` starts a new
    /// object at `key`, discarding anything previously written there.
    async fn upload_chunk(
        &self,
        bucket: &str,
        key: &str,
        chunk: Bytes,
        content_type: &str,
        is_first: bool,
    ) -> StorageResult<()>;

    /// Resolve a previously written key to a retrievable URL.
    async fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
