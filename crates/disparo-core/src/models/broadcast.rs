use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::MediaAsset;
use super::company::CompanyScope;
use super::filter::FilterSet;

/// Broadcast request lifecycle.
///
/// A request is mutated only by the assembler and persisted exactly once, in
/// a terminal state. Retries create a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    Draft,
    Assembling,
    Ready,
    Failed,
}

/// One assembled media-message send, ready for the downstream delivery
/// worker.
///
/// `message` is transported verbatim: lightweight markup tokens and the
/// `{recipient_name}` placeholder are opaque to this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub company: CompanyScope,
    pub created_by: String,
    pub message: String,
    /// Display order of the submission, preserved; not delivery-critical.
    pub attachments: Vec<MediaAsset>,
    pub filters: FilterSet,
    /// Snapshot taken once at assembly time; may drift before delivery.
    pub resolved_audience_size: u64,
    pub status: BroadcastStatus,
    pub created_at: DateTime<Utc>,
}

/// Result handed back to the caller after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    /// Identifier assigned by the persistence gateway.
    pub id: Uuid,
    pub resolved_audience_size: u64,
    pub status: BroadcastStatus,
}
