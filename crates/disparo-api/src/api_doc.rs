//! OpenAPI documentation.

use axum::Json;
use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::dispatch::{
    AttachmentMeta, DispatchResponse, FilterOptionsResponse, PreviewResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::dispatch::preview_dispatch,
        crate::handlers::dispatch::submit_dispatch,
        crate::handlers::dispatch::filter_options,
    ),
    components(schemas(
        AttachmentMeta,
        PreviewResponse,
        DispatchResponse,
        FilterOptionsResponse,
        ErrorResponse
    )),
    tags(
        (name = "dispatches", description = "Media broadcast dispatch operations")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
