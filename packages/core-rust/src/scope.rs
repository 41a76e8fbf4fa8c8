//! Login scopes and their clearance levels.
//!
//! A login scope names the authorization tier a token was issued for. The
//! set is closed: anything a client sends that does not match a known scope
//! parses to [`LoginScope::Other`] rather than failing.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Clearance level reported for strings outside the enumerated scope set.
pub const UNKNOWN_CLEARANCE: i32 = -1000;

/// Authorization tier carried in the `loginScope` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoginScope {
    Internal,
    Pin,
    Biometric,
    Mnp,
    Ekyc,
    MnpEkyc,
    Registration,
    Onboarding,
    Other,
    Prelogin,
    ResetPin,
    Tnc,
    External,
    BackOffice,
    Login,
}

/// Canonical wire string and clearance level for every scope.
///
/// Built once on first use and never mutated afterwards, so concurrent
/// readers need no synchronization.
static SCOPE_TABLE: LazyLock<HashMap<&'static str, (LoginScope, i32)>> = LazyLock::new(|| {
    LoginScope::ALL
        .iter()
        .map(|scope| (scope.as_str(), (*scope, scope.clearance_level())))
        .collect()
});

impl LoginScope {
    /// Every scope, in declaration order.
    pub const ALL: [LoginScope; 15] = [
        LoginScope::Internal,
        LoginScope::Pin,
        LoginScope::Biometric,
        LoginScope::Mnp,
        LoginScope::Ekyc,
        LoginScope::MnpEkyc,
        LoginScope::Registration,
        LoginScope::Onboarding,
        LoginScope::Other,
        LoginScope::Prelogin,
        LoginScope::ResetPin,
        LoginScope::Tnc,
        LoginScope::External,
        LoginScope::BackOffice,
        LoginScope::Login,
    ];

    /// Canonical string as it appears in the `loginScope` claim.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LoginScope::Internal => "internal",
            LoginScope::Pin => "pin",
            LoginScope::Biometric => "biometric",
            LoginScope::Mnp => "mnp",
            LoginScope::Ekyc => "ekyc",
            LoginScope::MnpEkyc => "mnp_ekyc",
            LoginScope::Registration => "registration",
            LoginScope::Onboarding => "onboarding",
            LoginScope::Other => "other",
            LoginScope::Prelogin => "prelogin",
            LoginScope::ResetPin => "resetpin",
            LoginScope::Tnc => "tnc",
            LoginScope::External => "external",
            LoginScope::BackOffice => "bo",
            LoginScope::Login => "login",
        }
    }

    /// Relative trust strength of the scope. Higher is stronger.
    #[must_use]
    pub const fn clearance_level(self) -> i32 {
        match self {
            LoginScope::Pin => 1000,
            LoginScope::Biometric => 500,
            LoginScope::Prelogin | LoginScope::Login => 250,
            LoginScope::ResetPin => 225,
            LoginScope::External
            | LoginScope::BackOffice
            | LoginScope::Onboarding
            | LoginScope::Registration => 200,
            LoginScope::Mnp | LoginScope::Ekyc | LoginScope::MnpEkyc | LoginScope::Tnc => 100,
            LoginScope::Internal => 0,
            LoginScope::Other => -1,
        }
    }

    /// Parses a scope string, ignoring ASCII case.
    ///
    /// Never fails: unknown input yields [`LoginScope::Other`]. Besides the
    /// canonical strings, the descriptive spellings `mnp+ekyc`, `reset-pin`,
    /// `terms-and-conditions` and `back-office` are accepted.
    #[must_use]
    pub fn parse(raw: &str) -> LoginScope {
        let lowered = raw.to_ascii_lowercase();
        match lowered.as_str() {
            "mnp+ekyc" => LoginScope::MnpEkyc,
            "reset-pin" => LoginScope::ResetPin,
            "terms-and-conditions" => LoginScope::Tnc,
            "back-office" => LoginScope::BackOffice,
            other => SCOPE_TABLE
                .get(other)
                .map_or(LoginScope::Other, |(scope, _)| *scope),
        }
    }
}

/// Clearance level of a raw scope string.
///
/// Only exact canonical strings are part of the enumerated set; anything
/// else, including differently cased spellings, reports
/// [`UNKNOWN_CLEARANCE`].
#[must_use]
pub fn clearance_level_of(raw: &str) -> i32 {
    SCOPE_TABLE
        .get(raw)
        .map_or(UNKNOWN_CLEARANCE, |(_, level)| *level)
}

impl fmt::Display for LoginScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginScope {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LoginScope::parse(s))
    }
}

impl Serialize for LoginScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LoginScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(LoginScope::parse(&raw))
    }
}
