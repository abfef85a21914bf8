//! JSON error responses.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use snipkit_catalog::CatalogError;
use snipkit_sanitize::{ConvertError, SanitizeError};
use tracing::error;

/// An error rendered as `{ "error": message }` with a status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(message) => Self::bad_request(message),
            CatalogError::ProjectNotFound(_)
            | CatalogError::ComponentNotFound(_)
            | CatalogError::UserNotFound(_) => Self::not_found(err.to_string()),
            CatalogError::PremiumRequired => {
                Self::new(StatusCode::PAYMENT_REQUIRED, "Premium subscription required")
            }
            CatalogError::Sanitize(err) => err.into(),
            CatalogError::Convert(err) => err.into(),
            CatalogError::Store(err) => {
                error!(error = %err, "catalog store failure");
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<SanitizeError> for ApiError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::InvalidInput => Self::bad_request("Code is missing or invalid"),
            SanitizeError::SanitizationFailed(cause) => {
                error!(error = %cause, "code sanitizer error");
                Self::new(StatusCode::BAD_GATEWAY, "Failed to sanitize code")
            }
            SanitizeError::EmptyOutput => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Sanitizer returned no code",
            ),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InvalidInput => Self::bad_request("Code is missing or invalid"),
            ConvertError::ConversionFailed(cause) => {
                error!(error = %cause, "code converter error");
                Self::new(StatusCode::BAD_GATEWAY, "Failed to convert code")
            }
            ConvertError::EmptyOutput => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Converter returned no code",
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipkit_catalog::StoreError;
    use snipkit_sanitize::CompletionError;
    use uuid::Uuid;

    #[test]
    fn catalog_errors_map_to_statuses() {
        let cases = [
            (CatalogError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CatalogError::ProjectNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (CatalogError::UserNotFound("u".into()), StatusCode::NOT_FOUND),
            (CatalogError::PremiumRequired, StatusCode::PAYMENT_REQUIRED),
            (
                CatalogError::Sanitize(SanitizeError::SanitizationFailed(
                    CompletionError::Transport("down".into()),
                )),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CatalogError::Sanitize(SanitizeError::EmptyOutput),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CatalogError::Store(StoreError::Query {
                    message: "locked".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn premium_message_is_stable() {
        let err = ApiError::from(CatalogError::PremiumRequired);
        assert_eq!(err.message, "Premium subscription required");
    }
}
