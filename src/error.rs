//! Per-request errors and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error body, shaped like an OAuth 2.0 error response (RFC 6749 §5.2).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

/// Failures a single request can hit. None of them affect other requests.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// Carries the status of the underlying body rejection, e.g. 413 when
    /// the body limit is hit.
    #[error("error reading request body: {reason}")]
    BodyUnreadable { status: StatusCode, reason: String },
    #[error("couldn't parse claims JSON: {0}")]
    MalformedClaims(String),
    #[error("unable to determine request host")]
    MissingAuthority,
    #[error("error creating JWT: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl IdpError {
    fn error_code(&self) -> &'static str {
        match self {
            IdpError::BodyUnreadable { .. }
            | IdpError::MalformedClaims(_)
            | IdpError::MissingAuthority => "invalid_request",
            IdpError::Signing(_) => "server_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IdpError::BodyUnreadable { status, .. } => *status,
            IdpError::MalformedClaims(_) | IdpError::MissingAuthority => StatusCode::BAD_REQUEST,
            IdpError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IdpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.error_code(),
            error_description: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_claims_is_bad_request() {
        let response = IdpError::MalformedClaims("expected value".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_request");
        assert!(
            body["error_description"]
                .as_str()
                .unwrap()
                .starts_with("couldn't parse claims JSON")
        );
    }

    #[tokio::test]
    async fn test_signing_failure_is_server_error() {
        let err = IdpError::from(jsonwebtoken::errors::Error::from(ErrorKind::InvalidAlgorithm));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "server_error");
    }

    #[test]
    fn test_body_unreadable_keeps_rejection_status() {
        let err = IdpError::BodyUnreadable {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            reason: "length limit exceeded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.error_code(), "invalid_request");
    }
}
