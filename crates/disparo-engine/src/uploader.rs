//! Media upload manager
//!
//! Drives one attachment from `Pending` to `Uploaded` or `Failed`:
//! validation, strategy selection (direct vs. chunked by size), one bounded
//! Direct→Chunked fallback on transient failure, and cumulative progress
//! tracking. One uploader task owns one asset; a failure here never touches
//! sibling assets.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use disparo_core::{
    AssetFailure, AssetStatus, FailureStage, MediaAsset, UploadPolicy, UploadStrategy,
};
use disparo_storage::{keys, ObjectStorage, StorageError};

/// One attachment payload as received from the caller.
#[derive(Debug, Clone)]
pub struct AssetPayload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl AssetPayload {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Per-asset upload state machine executor.
pub struct MediaUploader {
    storage: Arc<dyn ObjectStorage>,
    policy: UploadPolicy,
}

impl MediaUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>, policy: UploadPolicy) -> Self {
        Self { storage, policy }
    }

    /// Validate content type and size. Pure; performs no I/O, so rejection
    /// happens before any network call.
    pub fn validate(&self, payload: &AssetPayload) -> Result<(), String> {
        self.validate_meta(&payload.content_type, payload.size_bytes())
    }

    /// Policy check against declared metadata only, for callers that do not
    /// hold the payload bytes yet (the preview path).
    pub fn validate_meta(&self, content_type: &str, size_bytes: u64) -> Result<(), String> {
        if !self.policy.allows_content_type(content_type) {
            return Err(format!("Content type {} is not allowed", content_type));
        }
        if size_bytes > self.policy.max_file_size_bytes {
            return Err(format!(
                "File size {} bytes exceeds maximum of {} MB",
                size_bytes,
                self.policy.max_file_size_bytes / 1024 / 1024
            ));
        }
        Ok(())
    }

    /// Run the full state machine for one asset.
    ///
    /// Returns the terminal `MediaAsset` on success, or an attributable
    /// failure. At most one strategy fallback is attempted.
    pub async fn run(&self, bucket: &str, payload: &AssetPayload) -> Result<MediaAsset, AssetFailure> {
        let mut asset = MediaAsset::pending(
            payload.filename.clone(),
            payload.content_type.clone(),
            payload.size_bytes(),
        );

        asset.status = AssetStatus::Validating;
        if let Err(reason) = self.validate(payload) {
            tracing::warn!(
                filename = %payload.filename,
                reason = %reason,
                "Attachment rejected at validation"
            );
            return Err(AssetFailure {
                filename: payload.filename.clone(),
                stage: FailureStage::Validation,
                strategy: None,
                reason,
            });
        }

        let key = keys::asset_key(Utc::now().timestamp_millis(), &payload.filename);
        asset.storage_key = Some(key.clone());
        asset.status = AssetStatus::Uploading;

        let strategy = if payload.size_bytes() <= self.policy.direct_threshold_bytes {
            match self.upload_direct(bucket, &key, payload).await {
                Ok(()) => {
                    asset.uploaded_bytes = payload.size_bytes();
                    UploadStrategy::Direct
                }
                Err(e) if e.is_transient() => {
                    // Single permitted fallback: retry the whole payload
                    // through the chunked path.
                    tracing::warn!(
                        filename = %payload.filename,
                        key = %key,
                        error = %e,
                        "Direct upload failed, falling back to chunked"
                    );
                    self.upload_chunked(bucket, &key, payload, &mut asset)
                        .await
                        .map_err(|e| AssetFailure {
                            filename: payload.filename.clone(),
                            stage: FailureStage::Upload,
                            strategy: Some(UploadStrategy::Chunked),
                            reason: e.to_string(),
                        })?;
                    UploadStrategy::Chunked
                }
                Err(e) => {
                    return Err(AssetFailure {
                        filename: payload.filename.clone(),
                        stage: FailureStage::Upload,
                        strategy: Some(UploadStrategy::Direct),
                        reason: e.to_string(),
                    });
                }
            }
        } else {
            self.upload_chunked(bucket, &key, payload, &mut asset)
                .await
                .map_err(|e| AssetFailure {
                    filename: payload.filename.clone(),
                    stage: FailureStage::Upload,
                    strategy: Some(UploadStrategy::Chunked),
                    reason: e.to_string(),
                })?;
            UploadStrategy::Chunked
        };

        let url = self
            .storage
            .public_url(bucket, &key)
            .await
            .map_err(|e| AssetFailure {
                filename: payload.filename.clone(),
                stage: FailureStage::Upload,
                strategy: Some(strategy),
                reason: format!("Failed to resolve public URL: {}", e),
            })?;

        asset.upload_strategy = Some(strategy);
        asset.public_url = Some(url);
        asset.status = AssetStatus::Uploaded;

        tracing::info!(
            filename = %payload.filename,
            key = %key,
            strategy = ?strategy,
            size_bytes = payload.size_bytes(),
            "Attachment uploaded"
        );

        Ok(asset)
    }

    async fn upload_direct(
        &self,
        bucket: &str,
        key: &str,
        payload: &AssetPayload,
    ) -> Result<(), StorageError> {
        self.storage
            .upload_object(bucket, key, payload.data.clone(), &payload.content_type)
            .await
    }

    /// Chunked transfer: fixed-size pieces, strictly sequential, same key.
    /// Any chunk failure aborts the asset; there is no per-chunk retry.
    async fn upload_chunked(
        &self,
        bucket: &str,
        key: &str,
        payload: &AssetPayload,
        asset: &mut MediaAsset,
    ) -> Result<(), StorageError> {
        asset.uploaded_bytes = 0;
        let chunk_size = self.policy.chunk_size_bytes as usize;

        for (index, chunk) in payload.data.chunks(chunk_size).enumerate() {
            self.storage
                .upload_chunk(
                    bucket,
                    key,
                    payload.data.slice_ref(chunk),
                    &payload.content_type,
                    index == 0,
                )
                .await?;

            asset.uploaded_bytes += chunk.len() as u64;
            tracing::debug!(
                filename = %payload.filename,
                key = %key,
                chunk_index = index,
                uploaded_bytes = asset.uploaded_bytes,
                total_bytes = payload.size_bytes(),
                "Chunk written"
            );
        }

        Ok(())
    }
}
