//! Authentication middleware: context extraction, scope gating, error
//! rendering and the handler-side extractor.

pub mod allowed_scopes;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod route_context;
pub mod sink;

pub use allowed_scopes::{AllowedScopesLayer, AllowedScopesService};
pub use extract::{ContextExtractionLayer, ContextExtractionService};
pub use pipeline::{build_auth_layers, AuthLayers};
pub use render::{ErrorRenderLayer, ErrorRenderService};
pub use route_context::RouteContext;
pub use sink::ErrorSink;
