//! The uniform invocation result envelope.
//!
//! Every tool invocation, whatever its outcome, is reported through
//! [`ToolResult`]: a success flag, an HTTP-shaped status code, a closed set
//! of error codes, a correlation id, and an execution-duration measurement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use trellis_odata::ServiceError;

/// Error codes surfaced to callers.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const ETAG_MISMATCH: &str = "ETAG_MISMATCH";
    pub const ETAG_REQUIRED: &str = "ETAG_REQUIRED";
    pub const TIMEOUT: &str = "TIMEOUT";
}

/// Uniform result of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Whether the invocation succeeded.
    pub is_success: bool,

    /// HTTP-shaped status of the outcome.
    pub status_code: u16,

    /// Correlation id tying logs, request, and result together.
    pub correlation_id: String,

    /// When the invocation finished (UTC).
    pub completed_at: DateTime<Utc>,

    /// Wall-clock execution time.
    pub execution_duration_ms: u64,

    /// Response payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Stable error code from the closed taxonomy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Non-fatal notes, e.g. a failed concurrency-token prefetch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ToolResult {
    /// A successful result carrying `data`.
    pub fn success(status_code: u16, data: Value) -> Self {
        Self {
            is_success: true,
            status_code,
            correlation_id: String::new(),
            completed_at: Utc::now(),
            execution_duration_ms: 0,
            data: if data.is_null() { None } else { Some(data) },
            error_message: None,
            error_code: None,
            warnings: Vec::new(),
        }
    }

    /// A failed result with an explicit code and message.
    pub fn failure(status_code: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            status_code,
            correlation_id: String::new(),
            completed_at: Utc::now(),
            execution_duration_ms: 0,
            data: None,
            error_message: Some(message.into()),
            error_code: Some(code.into()),
            warnings: Vec::new(),
        }
    }

    /// Map a downstream/translation error into the envelope.
    pub fn from_service_error(error: &ServiceError) -> Self {
        let status = error.status_code();
        let code = match error {
            ServiceError::NotFound => codes::NOT_FOUND.to_string(),
            ServiceError::Unauthorized => codes::UNAUTHORIZED.to_string(),
            ServiceError::PreconditionFailed => codes::ETAG_MISMATCH.to_string(),
            ServiceError::PreconditionRequired => codes::ETAG_REQUIRED.to_string(),
            ServiceError::Validation(_) => codes::VALIDATION_ERROR.to_string(),
            ServiceError::Timeout => codes::TIMEOUT.to_string(),
            ServiceError::Downstream { status, .. } => status_text(*status),
            ServiceError::Transport(_) => status_text(502),
        };
        Self::failure(status, code, error.to_string())
    }

    /// Map an unexpected local error caught at the handler boundary.
    pub fn from_local_error(error: &LocalError) -> Self {
        let (status, code) = error.status_and_code();
        Self::failure(status, code, error.to_string())
    }

    /// Stamp correlation id and duration once the invocation completes.
    pub fn with_meta(mut self, correlation_id: &str, started: Instant) -> Self {
        self.correlation_id = correlation_id.to_string();
        self.execution_duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.completed_at = Utc::now();
        self
    }

    /// Attach accumulated warnings.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Unexpected local failures caught at the outermost handler boundary.
///
/// Each variant maps to a specific status; anything else travels as
/// [`LocalError::Other`] with its type name preserved as the error code.
#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{message}")]
    Other {
        /// Error type name, preserved as the error code.
        type_name: String,
        message: String,
    },
}

impl LocalError {
    /// The status/code pair for the envelope.
    pub fn status_and_code(&self) -> (u16, String) {
        match self {
            LocalError::InvalidArgument(_) => (400, codes::VALIDATION_ERROR.to_string()),
            LocalError::Unauthorized(_) => (401, codes::UNAUTHORIZED.to_string()),
            LocalError::IllegalState(_) => (409, "CONFLICT".to_string()),
            LocalError::Unsupported(_) => (501, "NOT_IMPLEMENTED".to_string()),
            LocalError::Timeout(_) => (408, codes::TIMEOUT.to_string()),
            LocalError::Other { type_name, .. } => (500, type_name.clone()),
        }
    }
}

/// The canonical status text rendered as a stable error code,
/// e.g. 503 → `SERVICE_UNAVAILABLE`.
fn status_text(status: u16) -> String {
    axum::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(|reason| reason.to_ascii_uppercase().replace(' ', "_"))
        .unwrap_or_else(|| format!("HTTP_{status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;

    #[test]
    fn envelope_serializes_camel_case() {
        let result = ToolResult::success(200, json!({"Id": 7}))
            .with_meta("corr-1", Instant::now())
            .with_warnings(vec!["note".to_string()]);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["isSuccess"], json!(true));
        assert_eq!(value["statusCode"], json!(200));
        assert_eq!(value["correlationId"], json!("corr-1"));
        assert_eq!(value["data"]["Id"], json!(7));
        assert_eq!(value["warnings"], json!(["note"]));
        assert!(value.get("errorCode").is_none());
        assert!(value.get("completedAt").is_some());
        assert!(value.get("executionDurationMs").is_some());
    }

    #[test]
    fn empty_warnings_are_omitted() {
        let value = serde_json::to_value(ToolResult::success(200, json!(null))).unwrap();
        assert!(value.get("warnings").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn service_errors_map_to_taxonomy() {
        let cases = [
            (ServiceError::NotFound, 404, codes::NOT_FOUND),
            (ServiceError::Unauthorized, 401, codes::UNAUTHORIZED),
            (ServiceError::PreconditionFailed, 412, codes::ETAG_MISMATCH),
            (ServiceError::PreconditionRequired, 428, codes::ETAG_REQUIRED),
            (
                ServiceError::Validation("missing".into()),
                400,
                codes::VALIDATION_ERROR,
            ),
            (ServiceError::Timeout, 408, codes::TIMEOUT),
        ];
        for (error, status, code) in cases {
            let result = ToolResult::from_service_error(&error);
            assert!(!result.is_success);
            assert_eq!(result.status_code, status);
            assert_eq!(result.error_code.as_deref(), Some(code));
            assert!(result.error_message.is_some());
        }
    }

    #[test]
    fn downstream_failures_carry_status_text() {
        let result = ToolResult::from_service_error(&ServiceError::Downstream {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert_eq!(result.status_code, 503);
        assert_eq!(result.error_code.as_deref(), Some("SERVICE_UNAVAILABLE"));
    }

    #[test]
    fn local_error_mapping_table() {
        let cases: [(LocalError, u16, &str); 5] = [
            (LocalError::InvalidArgument("x".into()), 400, "VALIDATION_ERROR"),
            (LocalError::Unauthorized("x".into()), 401, "UNAUTHORIZED"),
            (LocalError::IllegalState("x".into()), 409, "CONFLICT"),
            (LocalError::Unsupported("x".into()), 501, "NOT_IMPLEMENTED"),
            (LocalError::Timeout("x".into()), 408, "TIMEOUT"),
        ];
        for (error, status, code) in cases {
            let (s, c) = error.status_and_code();
            assert_eq!((s, c.as_str()), (status, code));
        }

        let other = LocalError::Other {
            type_name: "PoisonError".to_string(),
            message: "lock poisoned".to_string(),
        };
        let result = ToolResult::from_local_error(&other);
        assert_eq!(result.status_code, 500);
        assert_eq!(result.error_code.as_deref(), Some("PoisonError"));
    }
}
