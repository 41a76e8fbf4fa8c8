//! `claimgate` server: axum/tower layers that extract the request context
//! from the inbound token, gate routes by login scope and host the gateway.

pub mod error;
pub mod middleware;
pub mod network;

pub use error::AuthError;
pub use middleware::{
    build_auth_layers, AllowedScopesLayer, ContextExtractionLayer, ErrorRenderLayer, ErrorSink,
    RouteContext,
};
pub use network::{AuthConfig, GatewayConfig, NetworkModule};
