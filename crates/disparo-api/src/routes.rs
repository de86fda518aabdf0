//! Router assembly.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use disparo_core::UploadPolicy;
use tower_http::trace::TraceLayer;

use crate::api_doc::openapi_json;
use crate::handlers::dispatch::{filter_options, preview_dispatch, submit_dispatch};
use crate::handlers::health::health_check;
use crate::state::AppState;

/// Body cap for the multipart submission endpoint.
///
/// A submission may carry up to `max_attachments` files, each up to the
/// per-file ceiling, so the whole-body limit must cover their sum; the
/// extra headroom absorbs the payload field and multipart framing. Per-file
/// limits are enforced by the engine's validation, not here.
pub(crate) fn multipart_body_limit(policy: &UploadPolicy) -> usize {
    policy.max_file_size_bytes as usize * policy.max_attachments + 2 * 1024 * 1024
}

pub fn routes(state: Arc<AppState>) -> Router {
    let body_limit = multipart_body_limit(&state.config.upload_policy);

    Router::new()
        .route("/api/v0/dispatches", post(submit_dispatch))
        .route("/api/v0/dispatches/preview", post(preview_dispatch))
        .route("/api/v0/dispatches/filter-options", get(filter_options))
        .route("/healthz", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
