//! Downstream service error taxonomy.

use thiserror::Error;

/// Errors arising from the downstream data service, or locally before a
/// request is issued.
///
/// Local validation failures use [`ServiceError::Validation`] and are raised
/// before any network call; everything else reflects a downstream response
/// or transport outcome.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The addressed entity, relationship, or collection does not exist.
    #[error("resource not found")]
    NotFound,

    /// The downstream service rejected the caller's credential.
    #[error("not authorized by downstream service")]
    Unauthorized,

    /// The conditional-match precondition failed (stale concurrency token).
    #[error("concurrency token does not match current entity state")]
    PreconditionFailed,

    /// The service requires a concurrency token and none was supplied.
    #[error("downstream service requires a concurrency token")]
    PreconditionRequired,

    /// Invalid input detected before issuing any request.
    #[error("{0}")]
    Validation(String),

    /// The request was not answered before the deadline.
    #[error("request timed out")]
    Timeout,

    /// An unclassified downstream failure; the status is propagated.
    #[error("downstream service returned {status}: {message}")]
    Downstream {
        /// HTTP status code reported by the service.
        status: u16,
        /// Message extracted from the error body, or the raw body.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// The HTTP status surfaced in the result envelope for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::PreconditionFailed => 412,
            ServiceError::PreconditionRequired => 428,
            ServiceError::Validation(_) => 400,
            ServiceError::Timeout => 408,
            ServiceError::Downstream { status, .. } => *status,
            ServiceError::Transport(_) => 502,
        }
    }

    /// Classify a non-success downstream response.
    ///
    /// `body` is the raw response body; a JSON `error.message` field is
    /// extracted when present, matching the downstream error convention.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => ServiceError::NotFound,
            401 | 403 => ServiceError::Unauthorized,
            412 => ServiceError::PreconditionFailed,
            428 => ServiceError::PreconditionRequired,
            408 => ServiceError::Timeout,
            _ => ServiceError::Downstream {
                status,
                message: extract_error_message(body),
            },
        }
    }
}

/// Pull a human-readable message out of an error body.
fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = json["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = json["message"].as_str() {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error details provided".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ServiceError::from_status(404, ""),
            ServiceError::NotFound
        ));
        assert!(matches!(
            ServiceError::from_status(401, ""),
            ServiceError::Unauthorized
        ));
        assert!(matches!(
            ServiceError::from_status(403, ""),
            ServiceError::Unauthorized
        ));
        assert!(matches!(
            ServiceError::from_status(412, ""),
            ServiceError::PreconditionFailed
        ));
        assert!(matches!(
            ServiceError::from_status(428, ""),
            ServiceError::PreconditionRequired
        ));
    }

    #[test]
    fn unclassified_status_propagates() {
        let err = ServiceError::from_status(503, r#"{"error":{"message":"maintenance"}}"#);
        match err {
            ServiceError::Downstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn plain_body_falls_through() {
        let err = ServiceError::from_status(500, "boom");
        assert!(matches!(
            err,
            ServiceError::Downstream { status: 500, ref message } if message == "boom"
        ));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ServiceError::NotFound.status_code(), 404);
        assert_eq!(ServiceError::Validation("x".into()).status_code(), 400);
        assert_eq!(ServiceError::PreconditionFailed.status_code(), 412);
        assert_eq!(ServiceError::PreconditionRequired.status_code(), 428);
        assert_eq!(ServiceError::Timeout.status_code(), 408);
    }
}
