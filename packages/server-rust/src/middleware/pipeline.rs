//! Pipeline composition: the auth layers every protected router carries.

use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;

use super::extract::ContextExtractionLayer;
use super::render::ErrorRenderLayer;

/// Layer stack returned by [`build_auth_layers`].
pub type AuthLayers = ServiceBuilder<Stack<ContextExtractionLayer, Stack<ErrorRenderLayer, Identity>>>;

/// Builds the auth layer stack.
///
/// Layer order (outermost to innermost):
/// 1. `ErrorRenderLayer` -- installs the error sink, renders the first error
/// 2. `ContextExtractionLayer` -- publishes the `RequestContext`
///
/// Scope gates ([`super::AllowedScopesLayer`]) go on individual routes
/// inside this stack so they see the extracted context.
#[must_use]
pub fn build_auth_layers() -> AuthLayers {
    ServiceBuilder::new()
        .layer(ErrorRenderLayer)
        .layer(ContextExtractionLayer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use claimgate_core::{LoginScope, RequestContext};
    use http::Request;
    use tower::{service_fn, Layer, ServiceExt};

    use super::*;
    use crate::middleware::testing::{bearer, request_with};
    use crate::middleware::AllowedScopesLayer;

    async fn echo_scope(req: Request<Body>) -> Result<Response, Infallible> {
        let scope = req
            .extensions()
            .get::<RequestContext>()
            .map(RequestContext::scope);
        Ok(format!("{scope:?}").into_response())
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let svc = build_auth_layers().service(service_fn(echo_scope));
        let req = request_with(&[("Authorization", &bearer(r#"{"loginScope":"ekyc"}"#))]);

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "Some(Ekyc)");
    }

    #[tokio::test]
    async fn missing_authorization_renders_401_json() {
        let svc = build_auth_layers().service(service_fn(echo_scope));

        let resp = svc.oneshot(request_with(&[])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["error"], "missing_authorization");
    }

    #[tokio::test]
    async fn gate_denial_is_rendered_as_json() {
        let gated = AllowedScopesLayer::new([LoginScope::Internal]).layer(service_fn(echo_scope));
        let svc = build_auth_layers().service(gated);
        let req = request_with(&[("X-Authorization", &bearer(r#"{"loginScope":"pin"}"#))]);

        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["status"], 403);
        assert_eq!(body["error"], "scope_forbidden");
    }
}
