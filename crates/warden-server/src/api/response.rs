//! API response types
//!
//! Successful responses carry the resource itself, as the operator console
//! expects. Failures share one envelope:
//! `{"success": false, "error": {"code", "message", "details"?}}`.

use serde::Serialize;

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an error response with details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "missing")).unwrap();
        assert_eq!(
            body,
            json!({"success": false, "error": {"code": "NOT_FOUND", "message": "missing"}})
        );

        let body = serde_json::to_value(ErrorResponse::with_details(
            "TABLE_PROTECTED",
            "table 'products' is protected",
            json!({"auditId": 7}),
        ))
        .unwrap();
        assert_eq!(body["error"]["details"]["auditId"], 7);
    }
}
