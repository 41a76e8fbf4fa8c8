//! Gateway configuration types.

use std::time::Duration;

use axum::http::StatusCode;
use claimgate_core::LoginScope;

/// Top-level configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Token handling settings.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            auth: AuthConfig::default(),
        }
    }
}

/// Settings for extraction, scope gating and repacking.
#[derive(Clone)]
pub struct AuthConfig {
    /// RSA private key (PKCS8 PEM or bare base64) used to re-sign tokens.
    /// Without it repacking logs and forwards the previous token.
    pub signing_key: Option<String>,
    /// Status recorded when a gate rejects the login scope.
    pub forbidden_status: StatusCode,
    /// Whether gates check `exp`, `iat` and `nbf`.
    pub validate_claims: bool,
    /// Scopes allowed to mint an internal token.
    pub internal_token_scopes: Vec<LoginScope>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: None,
            forbidden_status: StatusCode::FORBIDDEN,
            validate_claims: true,
            internal_token_scopes: vec![LoginScope::Pin, LoginScope::Biometric],
        }
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("forbidden_status", &self.forbidden_status)
            .field("validate_claims", &self.validate_claims)
            .field("internal_token_scopes", &self.internal_token_scopes)
            .finish()
    }
}
