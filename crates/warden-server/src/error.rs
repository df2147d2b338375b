//! Server-specific error types
//!
//! [`AppError`] is what handlers return when they do not need their own
//! error enum. Gateway failures map onto HTTP statuses here so every route
//! reports a blocked or failed operation the same way.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use warden_common::WardenError;

use crate::api::response::ErrorResponse;
use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<WardenError> for AppError {
    fn from(err: WardenError) -> Self {
        match err {
            WardenError::InvalidTableName(_)
            | WardenError::UnknownOperation(_)
            | WardenError::UnknownStatus(_) => AppError::Validation(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Status and error code for a store failure.
pub fn store_error_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::UndefinedTable(_) | StoreError::UndefinedColumn(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND")
        },
        StoreError::Syntax(_) => (StatusCode::BAD_REQUEST, "SYNTAX_ERROR"),
        StoreError::Constraint(_) => (StatusCode::CONFLICT, "CONSTRAINT_VIOLATION"),
        StoreError::Rejected(_) => (StatusCode::FORBIDDEN, "OPERATION_REJECTED"),
        StoreError::Timeout(_) | StoreError::Connection(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE")
        },
        StoreError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DOWNSTREAM_ERROR"),
    }
}

/// HTTP status, error code and envelope for a gateway failure.
pub fn gateway_error_response(err: &GatewayError) -> (StatusCode, ErrorResponse) {
    match err {
        GatewayError::PolicyBlocked {
            operation,
            table,
            reason,
            audit_id,
            ..
        } => (
            StatusCode::FORBIDDEN,
            ErrorResponse::with_details(
                "TABLE_PROTECTED",
                reason.clone(),
                json!({
                    "operation": operation,
                    "table": table,
                    "reason": reason,
                    "auditId": audit_id,
                }),
            ),
        ),
        GatewayError::ClassificationFailed {
            reason, audit_id, ..
        } => (
            StatusCode::FORBIDDEN,
            ErrorResponse::with_details(
                "OPERATION_BLOCKED",
                reason.clone(),
                json!({
                    "operation": "UNKNOWN",
                    "reason": reason,
                    "auditId": audit_id,
                }),
            ),
        ),
        GatewayError::Downstream {
            operation,
            table,
            source,
            audit_id,
            ..
        } => {
            let (status, code) = store_error_status(source);
            if status.is_server_error() {
                tracing::error!(error = %source, operation = %operation, table = %table, "Store error");
            }
            (
                status,
                ErrorResponse::with_details(
                    code,
                    source.to_string(),
                    json!({
                        "operation": operation,
                        "table": table,
                        "auditId": audit_id,
                    }),
                ),
            )
        },
        GatewayError::NotFound(message) => {
            (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", message.clone()))
        },
        GatewayError::Aborted { reason, audit_id } => {
            tracing::error!(?audit_id, "Gateway task aborted: {}", reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::with_details(
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                    json!({ "auditId": audit_id }),
                ),
            )
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Gateway(ref err) => gateway_error_response(err),
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("NOT_FOUND", message))
            },
            AppError::Validation(message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::new("VALIDATION_ERROR", message))
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
                )
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use warden_common::OperationType;

    #[test]
    fn test_policy_block_is_forbidden() {
        let err = GatewayError::PolicyBlocked {
            operation: OperationType::Delete,
            table: "products".into(),
            reason: "table 'products' is protected".into(),
            statement: "DELETE FROM products".into(),
            audit_id: 3,
        };
        let (status, body) = gateway_error_response(&err);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error.code, "TABLE_PROTECTED");
        assert_eq!(body.error.message, "table 'products' is protected");
        let details = body.error.details.unwrap();
        assert_eq!(details["operation"], "DELETE");
        assert_eq!(details["auditId"], 3);
    }

    #[test]
    fn test_store_error_statuses() {
        let cases = [
            (StoreError::UndefinedTable("x".into()), StatusCode::NOT_FOUND),
            (StoreError::Syntax("bad".into()), StatusCode::BAD_REQUEST),
            (StoreError::Constraint("dup".into()), StatusCode::CONFLICT),
            (StoreError::Rejected("no".into()), StatusCode::FORBIDDEN),
            (StoreError::Timeout("slow".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Connection("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::Other("?".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(store_error_status(&err).0, expected, "{err:?}");
        }
    }

    #[test]
    fn test_invalid_table_name_is_validation_error() {
        let err = AppError::from(WardenError::InvalidTableName(" ".into()));
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
