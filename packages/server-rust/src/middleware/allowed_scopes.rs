//! Scope-based authorization gate.
//!
//! Wraps a protected service and only lets requests through whose
//! `loginScope` claim parses to one of the allowed scopes.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use claimgate_core::{LoginScope, RequestContext, Validate};
use http::Request;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::extract::extract_into;
use super::sink::ErrorSink;
use crate::error::AuthError;
use crate::network::AuthConfig;

// ---------------------------------------------------------------------------
// AllowedScopesLayer
// ---------------------------------------------------------------------------

/// Tower layer guarding the inner service with a scope allow-list.
///
/// An empty allow-list admits every scope. Denials are recorded in the
/// request's [`ErrorSink`] as [`AuthError::ScopeForbidden`] carrying the
/// configured status (403 unless overridden); the gate answers with that
/// status and an empty body and leaves rendering to [`super::ErrorRenderLayer`].
#[derive(Debug, Clone)]
pub struct AllowedScopesLayer {
    allowed: Arc<HashSet<LoginScope>>,
    forbidden_status: StatusCode,
    validate_claims: bool,
}

impl AllowedScopesLayer {
    #[must_use]
    pub fn new(scopes: impl IntoIterator<Item = LoginScope>) -> Self {
        Self {
            allowed: Arc::new(scopes.into_iter().collect()),
            forbidden_status: StatusCode::FORBIDDEN,
            validate_claims: true,
        }
    }

    /// Takes the forbidden status and claims validation switch from `config`.
    #[must_use]
    pub fn from_config(scopes: impl IntoIterator<Item = LoginScope>, config: &AuthConfig) -> Self {
        Self::new(scopes)
            .forbidden_status(config.forbidden_status)
            .validate_claims(config.validate_claims)
    }

    /// Status recorded when the scope is not allowed.
    #[must_use]
    pub fn forbidden_status(mut self, status: StatusCode) -> Self {
        self.forbidden_status = status;
        self
    }

    /// Whether `exp`/`iat`/`nbf` are checked before the scope. On by default.
    #[must_use]
    pub fn validate_claims(mut self, enabled: bool) -> Self {
        self.validate_claims = enabled;
        self
    }

    fn check(&self, ctx: Option<&RequestContext>) -> Result<(), AuthError> {
        if self.validate_claims {
            if let Some(ctx) = ctx {
                ctx.validate()?;
            }
        }

        let raw = ctx.map_or("", RequestContext::login_scope);
        let scope = LoginScope::parse(raw);
        debug!(login_scope = raw, parsed = %scope, allowed = ?self.allowed, "validating login scope");

        if self.allowed.is_empty() || self.allowed.contains(&scope) {
            Ok(())
        } else {
            metrics::counter!("claimgate_scope_denied_total", "scope" => scope.as_str()).increment(1);
            Err(AuthError::ScopeForbidden {
                scope,
                status: self.forbidden_status,
            })
        }
    }
}

impl<S> Layer<S> for AllowedScopesLayer {
    type Service = AllowedScopesService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AllowedScopesService {
            inner,
            gate: self.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// AllowedScopesService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AllowedScopesService<S> {
    inner: S,
    gate: AllowedScopesLayer,
}

impl<S, B> Service<Request<B>> for AllowedScopesService<S>
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

        if req.extensions().get::<RequestContext>().is_none() && !sink.has_errors() {
            extract_into(&mut req);
        }

        if let Some(status) = sink.first_status() {
            warn!("allowed scopes are not being checked because there are already error(s) on the request, skipping");
            return Box::pin(async move { Ok(status.into_response()) });
        }

        let ctx = req.extensions().get::<RequestContext>();
        if ctx.is_none() {
            warn!("allowed scopes guard is used but the request context cannot be found");
        }

        if let Err(err) = self.gate.check(ctx) {
            let status = err.status();
            sink.record(err);
            return Box::pin(async move { Ok(status.into_response()) });
        }

        Box::pin(self.inner.call(req))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
