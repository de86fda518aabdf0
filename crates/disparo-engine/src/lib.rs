//! Disparo Engine Library
//!
//! The media broadcast dispatch engine: per-asset upload management with
//! strategy selection and fallback, filter-scoped audience resolution, and
//! the assembler that turns a draft submission into one durable broadcast
//! record ready for the downstream delivery worker.

pub mod assembler;
pub mod audience;
pub mod uploader;

// Re-export commonly used types
pub use assembler::{AssetMeta, BroadcastStore, DispatchDraft, DispatchEngine, PreparedDispatch};
pub use audience::{AudienceResolver, AudienceSource, FilterOptions};
pub use uploader::{AssetPayload, MediaUploader};
