//! HTTP handlers and the state they share.

pub mod context;
pub mod health;

pub use context::{context_handler, internal_token_handler};
pub use health::{health_handler, liveness_handler, HealthCheck, SigningKeyCheck};

use std::sync::Arc;

use claimgate_core::{SigningKeyProvider, StaticKeyProvider, TokenRepacker};

use super::GatewayConfig;

/// Shared application state passed to handlers via `State` extraction.
///
/// Holds `Arc` references so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Re-signs contexts handlers have changed.
    pub repacker: TokenRepacker,
    /// Probes run by the health endpoint, in order.
    pub health_checks: Arc<Vec<Arc<dyn HealthCheck>>>,
}

impl AppState {
    /// Builds state whose repacker reads the configured signing key.
    /// The key is also probed by the health endpoint.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let keys: Arc<dyn SigningKeyProvider> =
            Arc::new(StaticKeyProvider::new(config.auth.signing_key.clone()));
        Self::with_key_provider(config, keys)
    }

    #[must_use]
    pub fn with_key_provider(config: GatewayConfig, keys: Arc<dyn SigningKeyProvider>) -> Self {
        let health_checks: Vec<Arc<dyn HealthCheck>> =
            vec![Arc::new(SigningKeyCheck::new(Arc::clone(&keys)))];
        Self {
            config: Arc::new(config),
            repacker: TokenRepacker::new(keys),
            health_checks: Arc::new(health_checks),
        }
    }
}
