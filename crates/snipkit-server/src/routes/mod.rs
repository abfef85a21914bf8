//! Request handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};

use crate::error::ApiError;

pub mod ai;
pub mod catalog;
pub mod preview;

/// Header carrying the caller's identity-provider key.
pub const USER_HEADER: &str = "x-user-id";

/// The caller's external user id, taken from [`USER_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, format!("Missing {USER_HEADER} header"))
        })
    }
}
