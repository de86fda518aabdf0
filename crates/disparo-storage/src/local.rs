use crate::traits::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use disparo_core::StorageBackend;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Objects live under `{base_path}/{bucket}/{key}`. Chunk writes map to
/// `O_APPEND` file writes, which gives the same sequential-ordering
/// requirement as the S3 backend.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/disparo/objects")
    /// * `base_url` - Base URL for serving objects (e.g., "http://localhost:4000/objects")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert bucket and key to a filesystem path with security validation
    ///
    /// Rejects bucket/key values containing path traversal sequences that
    /// could escape the base storage directory.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty() || part.contains("..") || part.starts_with('/') {
                return Err(StorageError::InvalidKey(
                    "Storage key contains invalid characters".to_string(),
                ));
            }
        }

        Ok(self.base_path.join(bucket).join(key))
    }

    /// Generate public URL for an object
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), bucket, key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn upload_chunk(
        &self,
        bucket: &str,
        key: &str,
        chunk: Bytes,
        _content_type: &str,
        is_first: bool,
    ) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        let chunk_len = chunk.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut options = fs::OpenOptions::new();
        if is_first {
            // First chunk starts a fresh object at this key.
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true);
        }

        let mut file = options.open(&path).await.map_err(|e| {
            StorageError::ChunkFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        file.write_all(&chunk).await.map_err(|e| {
            StorageError::ChunkFailed(format!("Failed to append to {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::ChunkFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            chunk_bytes = chunk_len,
            is_first = is_first,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage chunk write successful"
        );

        Ok(())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        // URL resolution only makes sense for objects that were written.
        let path = self.object_path(bucket, key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(self.generate_url(bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:4000/objects".to_string())
            .await
            .unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn upload_object_writes_bytes() {
        let (dir, storage) = storage().await;
        storage
            .upload_object(
                "campanha",
                "disparos/1-foto.png",
                Bytes::from_static(b"payload"),
                "image/png",
            )
            .await
            .unwrap();

        let written = fs::read(dir.path().join("campanha/disparos/1-foto.png"))
            .await
            .unwrap();
        assert_eq!(written, b"payload");
    }

    #[tokio::test]
    async fn sequential_chunks_reconstruct_payload() {
        let (dir, storage) = storage().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        for (i, chunk) in payload.chunks(1024).enumerate() {
            storage
                .upload_chunk(
                    "campanha",
                    "disparos/2-video.mp4",
                    Bytes::copy_from_slice(chunk),
                    "video/mp4",
                    i == 0,
                )
                .await
                .unwrap();
        }

        let written = fs::read(dir.path().join("campanha/disparos/2-video.mp4"))
            .await
            .unwrap();
        assert_eq!(written, payload);
    }

    #[tokio::test]
    async fn first_chunk_discards_previous_object() {
        let (dir, storage) = storage().await;
        let key = "disparos/3-doc.pdf";

        storage
            .upload_chunk("campanha", key, Bytes::from_static(b"old"), "application/pdf", true)
            .await
            .unwrap();
        storage
            .upload_chunk("campanha", key, Bytes::from_static(b"new"), "application/pdf", true)
            .await
            .unwrap();
        storage
            .upload_chunk("campanha", key, Bytes::from_static(b"-tail"), "application/pdf", false)
            .await
            .unwrap();

        let written = fs::read(dir.path().join("campanha").join(key)).await.unwrap();
        assert_eq!(written, b"new-tail");
    }

    #[tokio::test]
    async fn public_url_requires_existing_object() {
        let (_dir, storage) = storage().await;
        let err = storage.public_url("campanha", "disparos/missing").await;
        assert!(matches!(err, Err(StorageError::NotFound(_))));

        storage
            .upload_object("campanha", "disparos/4-a.png", Bytes::from_static(b"x"), "image/png")
            .await
            .unwrap();
        assert_eq!(
            storage.public_url("campanha", "disparos/4-a.png").await.unwrap(),
            "http://localhost:4000/objects/campanha/disparos/4-a.png"
        );
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (_dir, storage) = storage().await;
        let err = storage
            .upload_object("campanha", "../escape", Bytes::from_static(b"x"), "image/png")
            .await;
        assert!(matches!(err, Err(StorageError::InvalidKey(_))));
    }
}
