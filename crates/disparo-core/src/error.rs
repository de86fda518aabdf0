//! Error types module
//!
//! All failures of the dispatch engine are unified under [`DispatchError`].
//! Per-asset upload failures are attributed individually through
//! [`AssetFailure`] so a caller always learns which stage and which
//! attachment failed; sibling assets are never affected by one asset's
//! failure.

use crate::models::UploadStrategy;

/// Stage at which a single asset failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Rejected before any network call (bad type or oversize).
    Validation,
    /// A transfer to the storage gateway failed.
    Upload,
}

/// Failure of one attachment, attributable to that attachment alone.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssetFailure {
    pub filename: String,
    pub stage: FailureStage,
    /// Strategy in use when the failure occurred. `None` when the asset
    /// never reached the transfer stage.
    pub strategy: Option<UploadStrategy>,
    pub reason: String,
}

impl std::fmt::Display for AssetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}): {}", self.filename, self.stage, self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Invalid submission: empty message with no attachments, bad attachment
    /// type, or oversized file. Never retried. `failures` is empty when the
    /// problem is not attributable to a specific attachment.
    #[error("Validation failed: {reason}")]
    Validation {
        reason: String,
        failures: Vec<AssetFailure>,
    },

    /// One or more attachments ended in a failed state after the single
    /// permitted strategy fallback. Already-uploaded siblings are kept.
    #[error("Upload failed for {} attachment(s)", failures.len())]
    Upload { failures: Vec<AssetFailure> },

    /// Missing or unresolvable tenant/bucket identity. Raised before any
    /// network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The audience snapshot count query failed.
    #[error("Audience resolution failed: {0}")]
    Audience(String),

    /// The final durable insert failed after all assets uploaded. Uploaded
    /// media are not rolled back.
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl DispatchError {
    /// Validation error not tied to any particular attachment.
    pub fn validation(reason: impl Into<String>) -> Self {
        DispatchError::Validation {
            reason: reason.into(),
            failures: Vec::new(),
        }
    }

    /// Machine-readable error code for structured responses.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Validation { .. } => "VALIDATION_ERROR",
            DispatchError::Upload { .. } => "UPLOAD_ERROR",
            DispatchError::Configuration(_) => "CONFIGURATION_ERROR",
            DispatchError::Audience(_) => "AUDIENCE_ERROR",
            DispatchError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Whether retrying the whole submission could succeed. Validation and
    /// configuration errors are deterministic and never worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DispatchError::Upload { .. }
                | DispatchError::Audience(_)
                | DispatchError::Persistence(_)
        )
    }
}
