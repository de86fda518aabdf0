//! Dispatch handlers
//!
//! `preview` runs the validation/audience phase only, backing the caller's
//! confirmation dialog. `submit` takes the full multipart submission: one
//! `payload` JSON field plus any number of repeated `file` fields, in
//! display order.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use disparo_core::{CompanyScope, DispatchError, DispatchReceipt, FilterCriterion, FilterSet};
use disparo_engine::{AssetMeta, AssetPayload, DispatchDraft};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DispatchPayload {
    pub company_uid: Uuid,
    pub company_name: String,
    pub created_by: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filters: Vec<FilterCriterion>,
}

impl DispatchPayload {
    fn into_draft(self, attachments: Vec<AssetPayload>) -> DispatchDraft {
        DispatchDraft {
            company: CompanyScope {
                uid: self.company_uid,
                name: self.company_name,
            },
            created_by: self.created_by,
            message: self.message,
            filters: FilterSet::new(self.filters),
            attachments,
        }
    }
}

/// Preview body: the submission JSON plus declared attachment metadata, so
/// an attachment-only draft can be previewed without transferring bytes.
#[derive(Debug, Deserialize)]
pub struct PreviewPayload {
    pub company_uid: Uuid,
    pub company_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filters: Vec<FilterCriterion>,
    #[serde(default)]
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    /// Recipients matching the filter set at this moment.
    pub resolved_audience_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct FilterOptionsQuery {
    pub company_uid: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilterOptionsResponse {
    pub cities: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub categories: Vec<String>,
    pub genders: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchResponse {
    pub id: Uuid,
    /// Audience snapshot taken at assembly time.
    pub resolved_audience_size: u64,
    pub status: String,
}

impl From<DispatchReceipt> for DispatchResponse {
    fn from(receipt: DispatchReceipt) -> Self {
        Self {
            id: receipt.id,
            resolved_audience_size: receipt.resolved_audience_size,
            status: format!("{:?}", receipt.status).to_lowercase(),
        }
    }
}

/// Preview a dispatch without uploading anything
///
/// Validates the submission and resolves the audience count so the caller
/// can confirm before committing.
#[utoipa::path(
    post,
    path = "/api/v0/dispatches/preview",
    tag = "dispatches",
    request_body(content = inline(Object), content_type = "application/json"),
    responses(
        (status = 200, description = "Audience resolved", body = PreviewResponse),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, payload), fields(operation = "preview_dispatch"))]
pub async fn preview_dispatch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewPayload>,
) -> Result<Json<PreviewResponse>, HttpAppError> {
    let company = CompanyScope {
        uid: payload.company_uid,
        name: payload.company_name,
    };
    let filters = FilterSet::new(payload.filters);
    let attachments: Vec<AssetMeta> = payload
        .attachments
        .into_iter()
        .map(|meta| AssetMeta {
            filename: meta.filename,
            content_type: meta.content_type,
            size_bytes: meta.size_bytes,
        })
        .collect();

    let resolved_audience_size = state
        .engine
        .preview(&company, &payload.message, &filters, &attachments)
        .await?;

    Ok(Json(PreviewResponse {
        resolved_audience_size,
    }))
}

/// Filter values available to a company
///
/// Distinct city, neighborhood, category and gender values present in the
/// company's voter universe; feeds the filter selectors in the client.
#[utoipa::path(
    get,
    path = "/api/v0/dispatches/filter-options",
    tag = "dispatches",
    params(
        ("company_uid" = Uuid, Query, description = "Company scope for the lookup")
    ),
    responses(
        (status = 200, description = "Available filter values", body = FilterOptionsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "filter_options"))]
pub async fn filter_options(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FilterOptionsQuery>,
) -> Result<Json<FilterOptionsResponse>, HttpAppError> {
    let options = state.engine.filter_options(query.company_uid).await?;

    Ok(Json(FilterOptionsResponse {
        cities: options.cities,
        neighborhoods: options.neighborhoods,
        categories: options.categories,
        genders: options.genders,
    }))
}

/// Submit a dispatch
///
/// Multipart form: a `payload` field with the submission JSON and repeated
/// `file` fields with the attachments. Uploads all attachments and persists
/// one ready broadcast record.
#[utoipa::path(
    post,
    path = "/api/v0/dispatches",
    tag = "dispatches",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Dispatch assembled and queued", body = DispatchResponse),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 502, description = "Attachment upload failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "submit_dispatch"))]
pub async fn submit_dispatch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DispatchResponse>), HttpAppError> {
    let mut payload: Option<DispatchPayload> = None;
    let mut attachments: Vec<AssetPayload> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        DispatchError::validation(format!("Malformed multipart body: {}", e))
    })? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("payload") => {
                let text = field.text().await.map_err(|e| {
                    DispatchError::validation(format!("Failed to read payload field: {}", e))
                })?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    DispatchError::validation(format!("Invalid payload JSON: {}", e))
                })?;
                payload = Some(parsed);
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_owned)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        DispatchError::validation("Attachment is missing a filename")
                    })?;
                let content_type = field
                    .content_type()
                    .map(str::to_owned)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await.map_err(|e| {
                    DispatchError::validation(format!(
                        "Failed to read attachment {}: {}",
                        filename, e
                    ))
                })?;
                attachments.push(AssetPayload::new(filename, content_type, data));
            }
            // Unknown fields are ignored so clients can evolve independently.
            _ => {}
        }
    }

    let payload = payload.ok_or_else(|| {
        DispatchError::validation("Missing required multipart field: payload")
    })?;

    let draft = payload.into_draft(attachments);
    let receipt = state.engine.submit(draft).await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}
