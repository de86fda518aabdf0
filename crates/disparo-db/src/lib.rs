//! Disparo Database Library
//!
//! Postgres repositories behind the engine's `AudienceSource` and
//! `BroadcastStore` seams, plus embedded migrations.

pub mod broadcasts;
pub mod voters;

// Re-export commonly used types
pub use broadcasts::BroadcastRepository;
pub use voters::VoterRepository;

/// Embedded migrations; run from the workspace root `migrations/` directory.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
