use serde::{Deserialize, Serialize};

/// Upload strategy chosen for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStrategy {
    /// Single-call transfer of the complete payload.
    Direct,
    /// Sequential, ordered multi-call transfer of fixed-size pieces to the
    /// same storage key.
    Chunked,
}

/// Per-asset upload state machine.
///
/// `Pending → Validating → Uploading → Uploaded | Failed`. Exactly one
/// uploader task owns an asset at a time; states only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Validating,
    Uploading,
    Uploaded,
    Failed,
}

/// One attached file tracked through its upload state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub original_filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Timestamped sanitized key; assigned when the transfer starts, never
    /// reused across assets.
    pub storage_key: Option<String>,
    /// Strategy that produced the terminal state.
    pub upload_strategy: Option<UploadStrategy>,
    pub status: AssetStatus,
    /// Cumulative bytes written, updated after each chunk (or the whole
    /// payload for direct uploads).
    pub uploaded_bytes: u64,
    /// Populated only when `status == Uploaded`.
    pub public_url: Option<String>,
}

impl MediaAsset {
    pub fn pending(
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            content_type: content_type.into(),
            size_bytes,
            storage_key: None,
            upload_strategy: None,
            status: AssetStatus::Pending,
            uploaded_bytes: 0,
            public_url: None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == AssetStatus::Uploaded
    }
}
