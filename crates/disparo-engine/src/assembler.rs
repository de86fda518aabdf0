//! Broadcast record assembler
//!
//! Turns one draft submission into one durable broadcast record. The work
//! splits into two phases: `prepare` does everything that needs no uploads
//! (validation, bucket derivation, audience snapshot) so the caller can show
//! a confirmation step, and `commit` performs the uploads and the single
//! insert. `submit` runs both back to back.
//!
//! Dropping an in-flight `commit` future cancels outstanding transfers;
//! partially written chunked objects may remain in storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use disparo_core::{
    AssetFailure, BroadcastRecord, BroadcastStatus, CompanyScope, DispatchError, DispatchReceipt,
    FailureStage, FilterSet, MediaAsset, UploadPolicy,
};
use disparo_storage::ObjectStorage;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use crate::audience::{AudienceResolver, AudienceSource, FilterOptions};
use crate::uploader::{AssetPayload, MediaUploader};

/// Persistence seam for assembled broadcast records.
#[async_trait]
pub trait BroadcastStore: Send + Sync {
    /// Insert one record and return the assigned id.
    async fn insert_broadcast(&self, record: &BroadcastRecord) -> anyhow::Result<Uuid>;
}

/// Declared attachment metadata, for previewing a submission whose bytes
/// have not been transferred yet.
#[derive(Debug, Clone)]
pub struct AssetMeta {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// One incoming submission, before any validation.
#[derive(Debug, Clone)]
pub struct DispatchDraft {
    pub company: CompanyScope,
    pub created_by: String,
    pub message: String,
    pub filters: FilterSet,
    pub attachments: Vec<AssetPayload>,
}

/// A draft that passed validation, with its bucket and audience snapshot.
///
/// The audience size is resolved exactly once, here; `commit` reuses it.
#[derive(Debug, Clone)]
pub struct PreparedDispatch {
    pub company: CompanyScope,
    pub created_by: String,
    pub message: String,
    pub filters: FilterSet,
    pub attachments: Vec<AssetPayload>,
    pub bucket: String,
    pub resolved_audience_size: u64,
}

/// Orchestrates validation, upload fan-out, audience resolution and the
/// final insert for one broadcast submission.
pub struct DispatchEngine {
    uploader: MediaUploader,
    resolver: AudienceResolver,
    store: Arc<dyn BroadcastStore>,
    policy: UploadPolicy,
}

impl DispatchEngine {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        audience: Arc<dyn AudienceSource>,
        store: Arc<dyn BroadcastStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            uploader: MediaUploader::new(storage, policy.clone()),
            resolver: AudienceResolver::new(audience),
            store,
            policy,
        }
    }

    /// Phase one: validate the draft and snapshot the audience count.
    ///
    /// Attachment policy violations (size ceiling, content-type allowlist)
    /// are caught here, before any byte leaves the process.
    pub async fn prepare(&self, draft: DispatchDraft) -> Result<PreparedDispatch, DispatchError> {
        if draft.message.trim().is_empty() && draft.attachments.is_empty() {
            return Err(DispatchError::validation(
                "A broadcast needs a message or at least one attachment",
            ));
        }
        self.check_attachment_count(draft.attachments.len())?;

        let bucket = draft.company.bucket().ok_or_else(|| {
            DispatchError::Configuration(format!(
                "Company {} has no name usable as a storage bucket",
                draft.company.uid
            ))
        })?;

        let failures: Vec<AssetFailure> = draft
            .attachments
            .iter()
            .filter_map(|payload| {
                self.uploader
                    .validate(payload)
                    .err()
                    .map(|reason| AssetFailure {
                        filename: payload.filename.clone(),
                        stage: FailureStage::Validation,
                        strategy: None,
                        reason,
                    })
            })
            .collect();
        if !failures.is_empty() {
            return Err(DispatchError::Validation {
                reason: format!("{} attachment(s) rejected", failures.len()),
                failures,
            });
        }

        let resolved_audience_size = self
            .resolver
            .resolve(draft.company.uid, &draft.filters)
            .await?;

        tracing::info!(
            company_uid = %draft.company.uid,
            bucket = %bucket,
            attachments = draft.attachments.len(),
            recipients = resolved_audience_size,
            "Dispatch prepared"
        );

        Ok(PreparedDispatch {
            company: draft.company,
            created_by: draft.created_by,
            message: draft.message,
            filters: draft.filters,
            attachments: draft.attachments,
            bucket,
            resolved_audience_size,
        })
    }

    /// Dry-run of `prepare` against declared attachment metadata.
    ///
    /// Backs the confirmation step: the caller sends filenames, content
    /// types and sizes but no bytes, and gets the audience snapshot the
    /// same validation gate would allow through.
    pub async fn preview(
        &self,
        company: &CompanyScope,
        message: &str,
        filters: &FilterSet,
        attachments: &[AssetMeta],
    ) -> Result<u64, DispatchError> {
        if message.trim().is_empty() && attachments.is_empty() {
            return Err(DispatchError::validation(
                "A broadcast needs a message or at least one attachment",
            ));
        }
        self.check_attachment_count(attachments.len())?;

        company.bucket().ok_or_else(|| {
            DispatchError::Configuration(format!(
                "Company {} has no name usable as a storage bucket",
                company.uid
            ))
        })?;

        let failures: Vec<AssetFailure> = attachments
            .iter()
            .filter_map(|meta| {
                self.uploader
                    .validate_meta(&meta.content_type, meta.size_bytes)
                    .err()
                    .map(|reason| AssetFailure {
                        filename: meta.filename.clone(),
                        stage: FailureStage::Validation,
                        strategy: None,
                        reason,
                    })
            })
            .collect();
        if !failures.is_empty() {
            return Err(DispatchError::Validation {
                reason: format!("{} attachment(s) rejected", failures.len()),
                failures,
            });
        }

        self.resolver.resolve(company.uid, filters).await
    }

    /// Distinct filter values available for one company.
    pub async fn filter_options(&self, company_uid: Uuid) -> Result<FilterOptions, DispatchError> {
        self.resolver.filter_options(company_uid).await
    }

    fn check_attachment_count(&self, count: usize) -> Result<(), DispatchError> {
        if count > self.policy.max_attachments {
            return Err(DispatchError::validation(format!(
                "Too many attachments: {} exceeds the limit of {}",
                count, self.policy.max_attachments
            )));
        }
        Ok(())
    }

    /// Phase two: upload every attachment and persist the record.
    ///
    /// Uploads fan out with bounded concurrency; each asset still runs its
    /// own chunks sequentially. One failed asset fails the whole request,
    /// and already-uploaded siblings stay in storage.
    pub async fn commit(
        &self,
        prepared: PreparedDispatch,
    ) -> Result<DispatchReceipt, DispatchError> {
        let uploads: Vec<_> = prepared
            .attachments
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                let uploader = &self.uploader;
                let bucket = prepared.bucket.as_str();
                async move { (index, uploader.run(bucket, payload).await) }
            })
            .collect();
        let outcomes: Vec<(usize, Result<MediaAsset, AssetFailure>)> = stream::iter(uploads)
            .buffer_unordered(self.policy.max_concurrent_uploads)
            .collect()
            .await;

        let mut uploaded: Vec<(usize, MediaAsset)> = Vec::new();
        let mut failures: Vec<AssetFailure> = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(asset) => uploaded.push((index, asset)),
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                company_uid = %prepared.company.uid,
                failed = failures.len(),
                uploaded = uploaded.len(),
                "Dispatch assembly failed"
            );
            return Err(DispatchError::Upload { failures });
        }

        // buffer_unordered yields in completion order; restore the
        // submission's display order.
        uploaded.sort_by_key(|(index, _)| *index);
        let attachments = uploaded.into_iter().map(|(_, asset)| asset).collect();

        let record = BroadcastRecord {
            company: prepared.company,
            created_by: prepared.created_by,
            message: prepared.message,
            attachments,
            filters: prepared.filters,
            resolved_audience_size: prepared.resolved_audience_size,
            status: BroadcastStatus::Ready,
            created_at: Utc::now(),
        };

        let id = self
            .store
            .insert_broadcast(&record)
            .await
            .map_err(|e| DispatchError::Persistence(format!("Broadcast insert failed: {}", e)))?;

        tracing::info!(
            broadcast_id = %id,
            company_uid = %record.company.uid,
            attachments = record.attachments.len(),
            recipients = record.resolved_audience_size,
            "Dispatch committed"
        );

        Ok(DispatchReceipt {
            id,
            resolved_audience_size: record.resolved_audience_size,
            status: record.status,
        })
    }

    /// Validate, upload and persist in one call.
    pub async fn submit(&self, draft: DispatchDraft) -> Result<DispatchReceipt, DispatchError> {
        let prepared = self.prepare(draft).await?;
        self.commit(prepared).await
    }
}
