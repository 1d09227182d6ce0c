use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{default_page_config, ContentKind, FontFamily};
use crate::models::preview::PreviewDocument;
use crate::preview::session::{PreviewSession, PreviewView, SessionSpec};
use crate::state::AppState;

const DEFAULT_BASE_FONT_SIZE_PT: f32 = 11.0;

#[derive(Deserialize)]
pub struct CreatePreviewRequest {
    pub document: PreviewDocument,
    #[serde(default)]
    pub font: FontFamily,
    pub base_font_size_pt: Option<f32>,
    #[serde(default)]
    pub content_kind: ContentKind,
    /// Overrides the configured hysteresis band for this preview only.
    pub tolerance_ratio: Option<f32>,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    pub document: PreviewDocument,
}

#[derive(Deserialize)]
pub struct ResizeRequest {
    pub width: f32,
    pub height: f32,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub font: FontFamily,
    pub base_font_size_pt: f32,
}

/// POST /api/v1/previews
pub async fn handle_create_preview(
    State(state): State<AppState>,
    Json(req): Json<CreatePreviewRequest>,
) -> Result<(StatusCode, Json<PreviewView>), AppError> {
    let spec = SessionSpec {
        document: req.document,
        font: req.font,
        base_font_size_pt: req.base_font_size_pt.unwrap_or(DEFAULT_BASE_FONT_SIZE_PT),
        content_kind: req.content_kind,
        tolerance_ratio: req.tolerance_ratio,
    };
    let session = PreviewSession::open(
        spec,
        &state.config.fit_policy,
        default_page_config(state.config.paper),
        state.config.adapter_quiet,
    )?;
    let session = state.sessions.insert(session).await?;
    Ok((StatusCode::CREATED, Json(session.view())))
}

/// GET /api/v1/previews/:id
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PreviewView>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session.view()))
}

/// PUT /api/v1/previews/:id/document
pub async fn handle_update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<PreviewView>, AppError> {
    let session = state.sessions.get(id).await?;
    session.replace_document(req.document);
    Ok(Json(session.view()))
}

/// POST /api/v1/previews/:id/resize
pub async fn handle_resize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResizeRequest>,
) -> Result<StatusCode, AppError> {
    if !(req.width.is_finite() && req.height.is_finite()) || req.width < 0.0 || req.height < 0.0 {
        return Err(AppError::Validation(
            "width and height must be non-negative numbers".to_string(),
        ));
    }
    let session = state.sessions.get(id).await?;
    session.observe_resize(req.width, req.height);
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/previews/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<PreviewView>, AppError> {
    let session = state.sessions.get(id).await?;
    session.retemplate(req.font, req.base_font_size_pt)?;
    Ok(Json(session.view()))
}

/// DELETE /api/v1/previews/:id
pub async fn handle_delete_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
