//! Domain models for broadcast dispatch.

pub mod asset;
pub mod broadcast;
pub mod company;
pub mod filter;

pub use asset::{AssetStatus, MediaAsset, UploadStrategy};
pub use broadcast::{BroadcastRecord, BroadcastStatus, DispatchReceipt};
pub use company::CompanyScope;
pub use filter::{FilterCriterion, FilterDimension, FilterSet};
