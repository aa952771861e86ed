// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the gateway API.
//!
//! Handlers return `Result<_, ApiError>`; the `IntoResponse` impl emits
//! the `{code, msg}` JSON envelope the console expects.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use kato_mq::MqError;
use kato_runtime::RuntimeError;
use kato_store::StoreError;

/// API errors surfaced to the console.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Malformed or missing request fields, duplicate plugin model,
    /// out-of-range port, rule already exists.
    #[error("{0}")]
    Validation(String),

    /// Repository miss.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness or state conflict.
    #[error("{0}")]
    Conflict(String),

    /// Admission gate rejection.
    #[error("operation in progress")]
    OperationInProgress,

    /// A backend subsystem failed; the underlying text bubbles up.
    #[error("{0}")]
    Downstream(String),

    /// Unexpected failure; details are logged, not returned.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::OperationInProgress => StatusCode::BAD_REQUEST,
            ApiError::Downstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(details) = &self {
            error!(details, "Internal error");
        }
        let status = self.status_code();
        let body = ErrorBody {
            code: status.as_u16(),
            msg: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what.to_string()),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MqError> for ApiError {
    fn from(err: MqError) -> Self {
        ApiError::Downstream(format!("send task failure: {err}"))
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        ApiError::Downstream(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("json: {err}"))
    }
}

/// Result type using ApiError.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::OperationInProgress.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Downstream("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::NotFound("component").into();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err: ApiError = StoreError::Conflict("tcp rule already exists".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_mq_error_message() {
        let err: ApiError = MqError::Json(serde_json::from_str::<i32>("x").unwrap_err()).into();
        assert!(err.to_string().starts_with("send task failure"));
    }
}
