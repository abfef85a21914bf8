//! Preview rendering.
//!
//! Interpreter values are not `Send`, so every render runs to completion on
//! the blocking pool and only the serializable [`RenderState`] comes back.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use serde::{Deserialize, Serialize};
use snipkit_render::{PreviewRenderer, RenderState, SnippetExecutor};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ApiError;
use crate::pages::PreviewPage;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResponse {
    /// "mounted" or "failed"
    pub status: &'static str,
    pub html: String,
    pub error: Option<String>,

    /// Pipeline stage that failed
    pub stage: Option<&'static str>,
    pub console: Vec<String>,
}

impl From<&RenderState> for PreviewResponse {
    fn from(state: &RenderState) -> Self {
        let failure = state.failure();
        Self {
            status: state.label(),
            html: state.to_html(),
            error: failure.map(|f| f.message.clone()),
            stage: failure.map(|f| f.kind.stage()),
            console: state
                .mounted()
                .map(|preview| preview.console.clone())
                .unwrap_or_default(),
        }
    }
}

/// Render `source` on the blocking pool.
pub async fn render_blocking(
    executor: Arc<dyn SnippetExecutor>,
    source: String,
) -> Result<RenderState, ApiError> {
    tokio::task::spawn_blocking(move || PreviewRenderer::new(executor).render(&source))
        .await
        .map_err(|e| {
            error!(error = %e, "render task failed");
            ApiError::internal("Failed to render preview")
        })
}

/// `POST /api/preview`
pub async fn render_snippet(
    State(state): State<AppState>,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let Json(request) = payload?;
    let rendered = render_blocking(state.executor.clone(), request.code).await?;
    debug!(status = rendered.label(), "rendered snippet preview");
    Ok(Json(PreviewResponse::from(&rendered)))
}

/// `GET /preview/{id}`: full page for a stored component's sanitized code.
pub async fn component_page(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Html<String>, ApiError> {
    let Path(id) = id?;
    let component = state.catalog.get_component(id).await?;
    let rendered = render_blocking(state.executor.clone(), component.edited_code).await?;

    let page = PreviewPage::new(component.name, component.framework.as_str(), &rendered);
    state.pages.preview(&page).map(Html).map_err(|e| {
        error!(error = %e, "preview template failed");
        ApiError::internal("Failed to render preview page")
    })
}
