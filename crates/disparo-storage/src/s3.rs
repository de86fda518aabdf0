use crate::traits::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use disparo_core::StorageBackend;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// S3-compatible storage implementation
///
/// Buckets are derived per company, so the gateway keeps a lazily built
/// store handle per bucket rather than binding to a single bucket at
/// construction.
pub struct S3Storage {
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    stores: RwLock<HashMap<String, AmazonS3>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn new(region: String, endpoint_url: Option<String>) -> Self {
        S3Storage {
            region,
            endpoint_url,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Store handle for one bucket, built on first use.
    async fn store_for(&self, bucket: &str) -> StorageResult<AmazonS3> {
        if let Some(store) = self.stores.read().await.get(bucket) {
            return Ok(store.clone());
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket.to_string());

        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        self.stores
            .write()
            .await
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Generate public URL for an object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style with the endpoint URL
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, bucket, key)
        } else {
            format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let store = self.store_for(bucket).await?;
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
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
        let store = self.store_for(bucket).await?;
        let location = Path::from(key.to_string());
        let chunk_len = chunk.len() as u64;
        let start = std::time::Instant::now();

        // S3 has no server-side append, so non-first chunks are a
        // read-modify-write of the partial object. This is why chunk writes
        // for one key must be strictly sequential and ordered.
        let payload = if is_first {
            chunk
        } else {
            let get_result: ObjectResult<_> = store.get(&location).await;
            let existing = get_result
                .map_err(|e| match e {
                    ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
                    other => StorageError::ChunkFailed(other.to_string()),
                })?
                .bytes()
                .await
                .map_err(|e| StorageError::ChunkFailed(e.to_string()))?;

            let mut combined = Vec::with_capacity(existing.len() + chunk.len());
            combined.extend_from_slice(&existing);
            combined.extend_from_slice(&chunk);
            Bytes::from(combined)
        };

        let result: ObjectResult<_> = store.put(&location, PutPayload::from(payload)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                chunk_bytes = chunk_len,
                is_first = is_first,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 chunk write failed"
            );
            StorageError::ChunkFailed(e.to_string())
        })?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            chunk_bytes = chunk_len,
            is_first = is_first,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 chunk write successful"
        );

        Ok(())
    }

    async fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        Ok(self.generate_url(bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
