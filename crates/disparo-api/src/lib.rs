//! Disparo API Library
//!
//! HTTP surface for the dispatch engine: a preview endpoint backing the
//! confirmation step, the multipart submission endpoint, and health checks.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::routes;
pub use state::AppState;
