//! Completion-backed endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snipkit_catalog::{CatalogError, Framework};
use snipkit_sanitize::{ConvertError, SanitizeError};
use tracing::error;
use uuid::Uuid;

use super::Identity;
use crate::error::ApiError;
use crate::server::AppState;

const INVALID_CODE: &str = "Code is missing or invalid";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixCodeResponse {
    pub sanitized_code: String,
}

/// `POST /api/ai/fixcode`
///
/// The body is inspected by hand so that malformed JSON, a missing `code`
/// and a non-string `code` all produce the same 400 response. The model's
/// rewrite is returned as-is, even when blank.
pub async fn fix_code(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<FixCodeResponse>, ApiError> {
    let code = payload
        .ok()
        .and_then(|Json(body)| match body.get("code") {
            Some(Value::String(code)) if !code.is_empty() => Some(code.clone()),
            _ => None,
        })
        .ok_or_else(|| ApiError::bad_request(INVALID_CODE))?;

    match state.sanitizer.rewrite(&code).await {
        Ok(sanitized) => Ok(Json(FixCodeResponse {
            sanitized_code: sanitized.code,
        })),
        Err(SanitizeError::InvalidInput | SanitizeError::EmptyOutput) => {
            Err(ApiError::bad_request(INVALID_CODE))
        }
        Err(SanitizeError::SanitizationFailed(cause)) => {
            error!(error = %cause, "code sanitizer error");
            Err(ApiError::internal("Failed to sanitize code"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub code: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub converted_code: String,
}

/// `POST /api/ai/convert`
pub async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request(INVALID_CODE))?;
    let from = parse_framework(&request.from)?;
    let to = parse_framework(&request.to)?;

    // Anonymous callers can only make same-framework requests.
    let user = Identity::from_headers(&headers).map(|Identity(id)| id).unwrap_or_default();

    conversion_response(state.catalog.convert_code(&user, &request.code, from, to).await)
}

#[derive(Debug, Deserialize)]
pub struct ConvertComponentRequest {
    pub to: String,
}

/// `POST /api/components/{id}/convert`: convert a stored component's source.
pub async fn convert_component(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ConvertComponentRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let to = parse_framework(&request.to)?;
    let user = Identity::from_headers(&headers).map(|Identity(id)| id).unwrap_or_default();

    conversion_response(state.catalog.convert_component(&user, id, to).await)
}

fn conversion_response(
    result: Result<String, CatalogError>,
) -> Result<Json<ConvertResponse>, ApiError> {
    match result {
        Ok(converted_code) => Ok(Json(ConvertResponse { converted_code })),
        Err(CatalogError::Convert(ConvertError::ConversionFailed(cause))) => {
            error!(error = %cause, "code converter error");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to convert code",
            ))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_framework(tag: &str) -> Result<Framework, ApiError> {
    tag.parse::<Framework>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}
