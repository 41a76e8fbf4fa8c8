//! Errors recorded into the request pipeline and how they render.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use claimgate_core::{ClaimsError, ExtractError, LoginScope};
use serde_json::json;

/// Failure recorded against a request by the auth layers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("invalid token claims: {0}")]
    InvalidClaims(#[from] ClaimsError),
    #[error("wrong scope: {scope} is not allowed")]
    ScopeForbidden { scope: LoginScope, status: StatusCode },
    #[error("request context is not available")]
    ContextUnavailable,
}

impl AuthError {
    /// HTTP status this error renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Extract(ExtractError::HeaderBinding { .. }) => StatusCode::BAD_REQUEST,
            AuthError::Extract(_) | AuthError::InvalidClaims(_) => StatusCode::UNAUTHORIZED,
            AuthError::ScopeForbidden { status, .. } => *status,
            AuthError::ContextUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Extract(e) => e.kind(),
            AuthError::InvalidClaims(_) => "invalid_claims",
            AuthError::ScopeForbidden { .. } => "scope_forbidden",
            AuthError::ContextUnavailable => "context_unavailable",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "status": status.as_u16(),
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(
            AuthError::Extract(ExtractError::MissingAuthorization).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Extract(ExtractError::HeaderBinding {
                name: "X-Device-ID",
                reason: "bad".into()
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidClaims(ClaimsError::NotYetValid).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ScopeForbidden {
                scope: LoginScope::Mnp,
                status: StatusCode::UNAUTHORIZED
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ContextUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn renders_json_body() {
        let response = AuthError::ScopeForbidden {
            scope: LoginScope::Other,
            status: StatusCode::FORBIDDEN,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 403);
        assert_eq!(body["error"], "scope_forbidden");
        assert_eq!(body["message"], "wrong scope: other is not allowed");
    }
}
