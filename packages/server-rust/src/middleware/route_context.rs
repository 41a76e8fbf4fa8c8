//! Handler-side access to the extracted request context.

use axum::extract::FromRequestParts;
use claimgate_core::RequestContext;
use http::request::Parts;
use tracing::warn;

use crate::error::AuthError;

/// The [`RequestContext`] published by [`super::ContextExtractionLayer`].
///
/// The handler gets its own copy. Mutations followed by a repack travel
/// downstream through [`claimgate_core::outbound_headers`], not back into
/// the request.
#[derive(Debug, Clone)]
pub struct RouteContext(pub RequestContext);

impl<S> FromRequestParts<S> for RouteContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<RequestContext>() {
            Some(ctx) => Ok(RouteContext(ctx.clone())),
            None => {
                warn!(uri = %parts.uri, "route context is requested but not found on the request");
                Err(AuthError::ContextUnavailable)
            }
        }
    }
}
