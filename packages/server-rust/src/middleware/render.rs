//! Outermost auth layer: turns recorded errors into the response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use http::Request;
use tower::{Layer, Service};
use tracing::debug;

use super::sink::ErrorSink;

// ---------------------------------------------------------------------------
// ErrorRenderLayer
// ---------------------------------------------------------------------------

/// Installs an [`ErrorSink`] on the request and, after the inner service
/// returns, replaces the response with the first recorded error if there
/// is one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorRenderLayer;

impl<S> Layer<S> for ErrorRenderLayer {
    type Service = ErrorRenderService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorRenderService { inner }
    }
}

// ---------------------------------------------------------------------------
// ErrorRenderService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ErrorRenderService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for ErrorRenderService<S>
where
    S: Service<Request<B>, Response = Response> + Send,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let sink = ErrorSink::attach(req.extensions_mut());
        let fut = self.inner.call(req);

        Box::pin(async move {
            let response = fut.await?;
            let mut errors = sink.drain();
            if errors.is_empty() {
                return Ok(response);
            }
            debug!(count = errors.len(), "rendering first recorded auth error");
            Ok(errors.swap_remove(0).into_response())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::StatusCode;
    use claimgate_core::{ExtractError, LoginScope};
    use tower::{service_fn, ServiceExt};

    use super::*;
    use crate::error::AuthError;
    use crate::middleware::testing::request_with;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn passes_through_without_errors() {
        let svc = ErrorRenderLayer.layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>((StatusCode::CREATED, "made").into_response())
        }));

        let resp = svc.oneshot(request_with(&[])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn renders_first_error() {
        let svc = ErrorRenderLayer.layer(service_fn(|req: Request<Body>| async move {
            let sink = req.extensions().get::<ErrorSink>().cloned().unwrap();
            sink.record(AuthError::ScopeForbidden {
                scope: LoginScope::Mnp,
                status: StatusCode::FORBIDDEN,
            });
            sink.record(AuthError::Extract(ExtractError::MissingAuthorization));
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        }));

        let resp = svc.oneshot(request_with(&[])).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "scope_forbidden");
        assert_eq!(body["message"], "wrong scope: mnp is not allowed");
    }
}
