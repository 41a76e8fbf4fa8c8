//! Registered JWT claims and the validity capability.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ClaimsError;

/// The `aud` claim, which tokens carry either as one string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

/// Registered claim names (RFC 7519 section 4.1). All are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    #[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Time-based validity of a claims set.
pub trait Validate {
    /// Checks the claims against `now`, in seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    fn validate_at(&self, now: i64) -> Result<(), ClaimsError>;

    /// Checks the claims against the system clock.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    fn validate(&self) -> Result<(), ClaimsError> {
        self.validate_at(unix_now())
    }
}

impl Validate for StandardClaims {
    fn validate_at(&self, now: i64) -> Result<(), ClaimsError> {
        if let Some(exp) = self.expires_at {
            if now > exp {
                return Err(ClaimsError::Expired { by_secs: now - exp });
            }
        }
        if let Some(iat) = self.issued_at {
            if now < iat {
                return Err(ClaimsError::IssuedInFuture);
            }
        }
        if let Some(nbf) = self.not_before {
            if now < nbf {
                return Err(ClaimsError::NotYetValid);
            }
        }
        Ok(())
    }
}

/// Seconds since the Unix epoch; 0 if the clock is before it.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_claims_are_valid() {
        assert!(StandardClaims::default().validate_at(1_700_000_000).is_ok());
    }

    #[test]
    fn expired() {
        let claims = StandardClaims {
            expires_at: Some(100),
            ..StandardClaims::default()
        };
        assert_eq!(claims.validate_at(100), Ok(()));
        assert_eq!(
            claims.validate_at(130),
            Err(ClaimsError::Expired { by_secs: 30 })
        );
    }

    #[test]
    fn issued_in_future() {
        let claims = StandardClaims {
            issued_at: Some(200),
            ..StandardClaims::default()
        };
        assert_eq!(claims.validate_at(199), Err(ClaimsError::IssuedInFuture));
        assert_eq!(claims.validate_at(200), Ok(()));
    }

    #[test]
    fn not_before() {
        let claims = StandardClaims {
            not_before: Some(50),
            ..StandardClaims::default()
        };
        assert_eq!(claims.validate_at(10), Err(ClaimsError::NotYetValid));
        assert_eq!(claims.validate_at(50), Ok(()));
    }

    #[test]
    fn audience_accepts_string_or_list() {
        let one: StandardClaims = serde_json::from_str(r#"{"aud":"svc"}"#).unwrap();
        assert_eq!(one.audience, Some(Audience::One("svc".into())));
        let many: StandardClaims = serde_json::from_str(r#"{"aud":["a","b"]}"#).unwrap();
        assert_eq!(
            many.audience,
            Some(Audience::Many(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn absent_claims_are_not_serialized() {
        let claims = StandardClaims {
            subject: Some("u-1".into()),
            ..StandardClaims::default()
        };
        assert_eq!(serde_json::to_string(&claims).unwrap(), r#"{"sub":"u-1"}"#);
    }
}
