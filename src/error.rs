//! Error type shared by the query layer and the HTTP handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::ledger::{Shortfall, WriteOffError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Every failure is request-local and maps to exactly one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or inconsistent input, reported against a field.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// A write-off would drive one or both reserve sides below zero.
    #[error("insufficient reserve: {}", describe_shortfalls(.0))]
    InsufficientReserve(Vec<Shortfall>),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Lost an optimistic-concurrency race too many times. Safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database pool or attachment storage timed out or failed. Safe to retry.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InsufficientReserve(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::InsufficientReserve(_) => "insufficient_reserve",
            Self::Authentication(_) => "authentication_error",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

fn describe_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Validation { field, message } => json!({
                "error": self.code(),
                "field": field,
                "message": message,
            }),
            Self::InsufficientReserve(shortfalls) => json!({
                "error": self.code(),
                "message": self.to_string(),
                "shortfalls": shortfalls,
            }),
            // never leak internals to the caller
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                json!({ "error": self.code(), "message": "internal server error" })
            }
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };
        let mut resp = (status, Json(body)).into_response();
        if matches!(status, StatusCode::SERVICE_UNAVAILABLE | StatusCode::CONFLICT) {
            resp.headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("1"));
        }
        resp
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record"),
            sqlx::Error::PoolTimedOut => Self::Unavailable("database pool timed out".to_string()),
            sqlx::Error::Database(db)
                if db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation() =>
            {
                Self::validation("non_field_errors", db.message())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<WriteOffError> for ApiError {
    fn from(err: WriteOffError) -> Self {
        match err {
            WriteOffError::Negative(side) => {
                Self::validation(side.field(), "amount must be non-negative")
            }
            WriteOffError::Insufficient(shortfalls) => Self::InsufficientReserve(shortfalls),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation("body", rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::validation("file", err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ReserveSide;
    use rust_decimal::Decimal;

    #[test]
    fn status_codes_follow_the_error_taxonomy() {
        assert_eq!(
            ApiError::validation("month", "duplicate").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InsufficientReserve(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authentication("bad credentials".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::PermissionDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("work").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Unavailable("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn insufficient_reserve_message_names_the_side() {
        let err = ApiError::InsufficientReserve(vec![Shortfall {
            side: ReserveSide::Accrual,
            requested: Decimal::new(500, 0),
            available: Decimal::new(400, 0),
        }]);
        let msg = err.to_string();
        assert!(msg.contains("accrual"), "{msg}");
        assert!(msg.contains("500"), "{msg}");
    }

    #[test]
    fn row_not_found_becomes_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_details_are_not_returned() {
        let resp = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
