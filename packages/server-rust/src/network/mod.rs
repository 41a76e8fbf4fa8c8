//! HTTP hosting: configuration, transport middleware, handlers and the
//! server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::*;
pub use handlers::{AppState, HealthCheck, SigningKeyCheck};
pub use module::NetworkModule;
