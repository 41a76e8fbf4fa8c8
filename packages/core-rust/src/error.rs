//! Error types for context extraction, claims validation and token signing.

/// Failures while turning inbound headers into a [`crate::RequestContext`].
///
/// Any of these aborts extraction; no context is produced.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("header {name} cannot be read: {reason}")]
    HeaderBinding { name: &'static str, reason: String },
    #[error("neither X-Authorization nor Authorization header is present")]
    MissingAuthorization,
    #[error("invalid number of components in jwt: expected 3, found {segments}")]
    MalformedToken { segments: usize },
    #[error("jwt payload is not valid base64: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("jwt payload is not a valid claims object: {0}")]
    PayloadDecode(#[from] serde_json::Error),
}

impl ExtractError {
    /// Short stable name of the failure, used as a metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::HeaderBinding { .. } => "header_binding",
            ExtractError::MissingAuthorization => "missing_authorization",
            ExtractError::MalformedToken { .. } => "malformed_token",
            ExtractError::Base64Decode(_) => "base64_decode",
            ExtractError::PayloadDecode(_) => "payload_decode",
        }
    }
}

/// Registered-claim validity violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    #[error("token is expired by {by_secs}s")]
    Expired { by_secs: i64 },
    #[error("token used before issued")]
    IssuedInFuture,
    #[error("token is not valid yet")]
    NotYetValid,
}

/// Failures while re-signing a context.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signing key is invalid: {0}")]
    KeyInvalid(String),
    #[error("token signing failed: {0}")]
    Failed(String),
}
