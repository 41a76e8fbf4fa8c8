//! Network module with deferred startup lifecycle.
//!
//! `new()` creates resources, `start()` binds the TCP listener, and
//! `serve()` starts accepting connections. The signing key provider is
//! available between construction and serving so callers can rotate keys.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use claimgate_core::{SigningKeyProvider, StaticKeyProvider};
use tokio::net::TcpListener;
use tracing::info;

use super::config::GatewayConfig;
use super::handlers::{
    context_handler, health_handler, internal_token_handler, liveness_handler, AppState,
};
use super::middleware::build_http_layers;
use crate::middleware::{build_auth_layers, AllowedScopesLayer};

/// Manages the HTTP server lifecycle.
pub struct NetworkModule {
    config: GatewayConfig,
    listener: Option<TcpListener>,
    keys: Arc<StaticKeyProvider>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let keys = Arc::new(StaticKeyProvider::new(config.auth.signing_key.clone()));
        Self {
            config,
            listener: None,
            keys,
        }
    }

    /// Shared handle to the signing key; rotating it affects routers built
    /// before the rotation too.
    #[must_use]
    pub fn key_provider(&self) -> Arc<StaticKeyProvider> {
        Arc::clone(&self.keys)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- dependency checks
    /// - `GET /health/live` -- liveness probe
    /// - `GET /context` -- extracted context (any valid token)
    /// - `POST /context/internal` -- re-signs the context with the internal
    ///   scope, gated by `auth.internal_token_scopes`
    pub fn build_router(&self) -> Router {
        let keys: Arc<dyn SigningKeyProvider> = self.keys.clone();
        let state = AppState::with_key_provider(self.config.clone(), keys);
        let auth = &self.config.auth;

        let internal_gate =
            AllowedScopesLayer::from_config(auth.internal_token_scopes.iter().copied(), auth);

        let protected = Router::new()
            .route("/context", get(context_handler))
            .route(
                "/context/internal",
                post(internal_token_handler).route_layer(internal_gate),
            )
            .layer(build_auth_layers());

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .merge(protected)
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
