//! Transport-level HTTP middleware.
//!
//! Ordering follows the outer-to-inner convention: the first layer listed
//! sees the request first and the response last.

use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use claimgate_core::extract::{X_AUTHORIZATION, X_CORRELATION_ID};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::config::GatewayConfig;

type MakeSpanFn = fn(&Request<axum::body::Body>) -> Span;

/// The composed layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                CompressionLayer,
                tower::layer::util::Stack<
                    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, MakeSpanFn>,
                    tower::layer::util::Stack<
                        SetRequestIdLayer<MakeRequestUuid>,
                        tower::layer::util::Identity,
                    >,
                >,
            >,
        >,
    >,
>;

/// Builds the transport middleware stack.
///
/// **Ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns `X-Request-Id`
/// 2. `Tracing` -- request span carrying method, uri, request and correlation ids
/// 3. `Compression`
/// 4. `CORS` -- configured origins, auth headers allowed
/// 5. `Timeout`
/// 6. `PropagateRequestId` -- copies `X-Request-Id` onto the response
#[must_use]
pub fn build_http_layers(config: &GatewayConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http().make_span_with(request_span as MakeSpanFn))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

fn request_span(req: &Request<axum::body::Body>) -> Span {
    let header = |name: &HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = %header(&HeaderName::from_static("x-request-id")),
        correlation_id = %header(&X_CORRELATION_ID),
    )
}

/// A wildcard `"*"` allows any origin, otherwise each entry that parses
/// is added to an explicit allowlist.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, X_AUTHORIZATION, X_CORRELATION_ID])
}
