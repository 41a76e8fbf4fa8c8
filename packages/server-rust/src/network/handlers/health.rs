//! Health and liveness endpoint handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use claimgate_core::SigningKeyProvider;
use serde_json::json;
use tracing::warn;

use super::AppState;

/// A dependency probed by [`health_handler`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Short name used in the failure message.
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Any error marks the service unhealthy.
    async fn check(&self) -> anyhow::Result<()>;
}

/// Runs every configured check in order.
///
/// All pass: 200 `{"status":"healthy"}`. The first failure short-circuits
/// with 500 `{"status":"unhealthy","msg":...}`.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    for check in state.health_checks.iter() {
        if let Err(e) = check.check().await {
            warn!(check = check.name(), error = %e, "health check failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "msg": format!("{} check error: {e}", check.name()),
                })),
            );
        }
    }
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Liveness probe -- always returns 200 OK.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Fails while no signing key is configured, i.e. while repacking would
/// keep forwarding stale tokens.
pub struct SigningKeyCheck {
    keys: Arc<dyn SigningKeyProvider>,
}

impl SigningKeyCheck {
    #[must_use]
    pub fn new(keys: Arc<dyn SigningKeyProvider>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl HealthCheck for SigningKeyCheck {
    fn name(&self) -> &str {
        "signing key"
    }

    async fn check(&self) -> anyhow::Result<()> {
        match self.keys.private_key() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => anyhow::bail!("no private key configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use claimgate_core::StaticKeyProvider;

    use super::*;
    use crate::network::GatewayConfig;

    struct Failing;

    #[async_trait]
    impl HealthCheck for Failing {
        fn name(&self) -> &str {
            "database"
        }

        async fn check(&self) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn state_with(checks: Vec<Arc<dyn HealthCheck>>) -> AppState {
        let mut state = AppState::new(GatewayConfig::default());
        state.health_checks = Arc::new(checks);
        state
    }

    #[tokio::test]
    async fn healthy_without_checks() {
        let (status, Json(body)) = health_handler(State(state_with(vec![]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn first_failure_is_reported() {
        let keys: Arc<dyn SigningKeyProvider> =
            Arc::new(StaticKeyProvider::new(Some("k".into())));
        let checks: Vec<Arc<dyn HealthCheck>> =
            vec![Arc::new(SigningKeyCheck::new(keys)), Arc::new(Failing)];
        let state = state_with(checks);

        let (status, Json(body)) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["msg"], "database check error: connection refused");
    }

    #[tokio::test]
    async fn signing_key_check_requires_key() {
        let check = SigningKeyCheck::new(Arc::new(StaticKeyProvider::new(None)));
        assert!(check.check().await.is_err());

        let check = SigningKeyCheck::new(Arc::new(StaticKeyProvider::new(Some("  ".into()))));
        assert!(check.check().await.is_err());
    }

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }
}
