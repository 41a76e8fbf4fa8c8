//! Context extraction middleware.
//!
//! Builds the [`RequestContext`] from the request headers and publishes it
//! in the request extensions, or records why it could not.

use std::task::{Context, Poll};

use claimgate_core::{extract_context, RequestContext};
use http::Request;
use tower::{Layer, Service};
use tracing::debug;

use super::sink::ErrorSink;
use crate::error::AuthError;

/// Runs extraction for `req`. Returns whether a context was published.
///
/// A context already present in the extensions is used as the merge base.
/// On failure the error goes into the request's [`ErrorSink`] and the
/// extensions are left as they were.
pub(crate) fn extract_into<B>(req: &mut Request<B>) -> bool {
    debug!(uri = %req.uri(), "parse route context activated");
    let sink = ErrorSink::attach(req.extensions_mut());

    match extract_context(req.headers(), req.extensions().get::<RequestContext>()) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            true
        }
        Err(e) => {
            metrics::counter!("claimgate_extraction_failures_total", "kind" => e.kind())
                .increment(1);
            sink.record(AuthError::from(e));
            false
        }
    }
}

// ---------------------------------------------------------------------------
// ContextExtractionLayer
// ---------------------------------------------------------------------------

/// Tower layer that extracts the request context before the inner service.
///
/// The inner service is always called. Whether a recorded failure stops
/// the request is up to the layers and handlers behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextExtractionLayer;

impl<S> Layer<S> for ContextExtractionLayer {
    type Service = ContextExtractionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextExtractionService { inner }
    }
}

// ---------------------------------------------------------------------------
// ContextExtractionService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ContextExtractionService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for ContextExtractionService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        extract_into(&mut req);
        self.inner.call(req)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
