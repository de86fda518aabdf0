//! Disparo Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! name sanitization shared across all Disparo components.

pub mod config;
pub mod error;
pub mod models;
pub mod sanitize;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, UploadPolicy};
pub use error::{AssetFailure, DispatchError, FailureStage};
pub use models::{
    AssetStatus, BroadcastRecord, BroadcastStatus, CompanyScope, DispatchReceipt, FilterCriterion,
    FilterDimension, FilterSet, MediaAsset, UploadStrategy,
};
pub use sanitize::sanitize;
pub use storage_types::StorageBackend;
