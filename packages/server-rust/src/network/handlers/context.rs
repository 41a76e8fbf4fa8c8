//! Handlers exposing the extracted request context.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use claimgate_core::{outbound_headers, LoginScope};
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::middleware::RouteContext;

/// Echoes the context built from the caller's token and headers.
pub async fn context_handler(RouteContext(ctx): RouteContext) -> Json<serde_json::Value> {
    let scope = ctx.scope();
    Json(json!({
        "context": ctx,
        "scope": scope,
        "clearanceLevel": scope.clearance_level(),
        "dirty": ctx.is_dirty(),
    }))
}

/// Switches the caller's context to the internal scope and re-signs it.
///
/// The response carries the headers a downstream call would be made with;
/// `X-Authorization` holds the new token. When signing fails the previous
/// token is returned and `repacked` is `false`.
pub async fn internal_token_handler(
    State(state): State<AppState>,
    RouteContext(mut ctx): RouteContext,
) -> (HeaderMap, Json<serde_json::Value>) {
    let previous = ctx.authorization().to_owned();
    let from = ctx.scope();

    ctx.set_scope(LoginScope::Internal);
    state.repacker.force_repack(&mut ctx);

    let repacked = ctx.authorization() != previous;
    info!(%from, repacked, "internal token requested");

    let headers = outbound_headers(&ctx);
    (
        headers,
        Json(json!({
            "scope": ctx.scope(),
            "repacked": repacked,
        })),
    )
}
