//! Per-request claims context with change tracking.
//!
//! A [`RequestContext`] is built from the payload of the inbound JWT plus a
//! handful of request headers. Handlers may change claims through the
//! `set_*` methods; any change that actually alters a value marks the
//! context dirty, which tells the repacker that the attached token no longer
//! matches the claims and must be re-signed before forwarding.

use serde::{Deserialize, Serialize};

use crate::claims::{StandardClaims, Validate};
use crate::error::ClaimsError;
use crate::scope::LoginScope;

/// Identity, device and session claims for one request.
///
/// Exclusively owned by the request that extracted it. Serializes to the
/// claims object that gets signed on repack; the bearer value and the dirty
/// flag are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(flatten)]
    pub(crate) claims: StandardClaims,

    #[serde(skip)]
    pub(crate) authorization: String,

    #[serde(rename = "X-Device-ID", skip_serializing_if = "String::is_empty")]
    pub(crate) device_id: String,
    #[serde(rename = "X-Platform", skip_serializing_if = "String::is_empty")]
    pub(crate) platform: String,
    #[serde(rename = "X-Client-Version", skip_serializing_if = "String::is_empty")]
    pub(crate) client_version: String,
    #[serde(rename = "X-Channel-ID", skip_serializing_if = "String::is_empty")]
    pub(crate) channel_id: String,
    #[serde(rename = "X-Device-Model", skip_serializing_if = "String::is_empty")]
    pub(crate) device_model: String,
    #[serde(rename = "X-Correlation-ID", skip_serializing_if = "String::is_empty")]
    pub(crate) correlation_id: String,
    #[serde(rename = "X-Forwarded-For", skip_serializing_if = "String::is_empty")]
    pub(crate) forwarded_for: String,
    #[serde(rename = "Accept-Language", skip_serializing_if = "String::is_empty")]
    pub(crate) language: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) request_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) user_agent: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) user_ref_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) cif_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) segment: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) otp_mobile_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) cid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) passport_no: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) login_scope: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) bo_user_full_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) bo_user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) api_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) dopa_ref_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) cbs_ref_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) any_id_req_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) os_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) trace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub(crate) span_id: String,

    #[serde(skip)]
    pub(crate) dirty: bool,
}

/// Generates `&str` read accessors for string fields.
macro_rules! str_accessors {
    ($($(#[$doc:meta])* $field:ident),+ $(,)?) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $field(&self) -> &str {
                &self.$field
            }
        )+
    };
}

/// Assigns `val` to `slot` only when it differs. Returns whether it changed.
fn replace_if_changed(slot: &mut String, val: &str) -> bool {
    if slot.as_str() == val {
        return false;
    }
    val.clone_into(slot);
    true
}

impl RequestContext {
    /// Creates an empty, clean context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any claim changed since the context was built or last signed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Registered claims carried alongside the custom ones.
    #[must_use]
    pub fn standard_claims(&self) -> &StandardClaims {
        &self.claims
    }

    /// The `loginScope` claim parsed into a [`LoginScope`].
    #[must_use]
    pub fn scope(&self) -> LoginScope {
        LoginScope::parse(&self.login_scope)
    }

    str_accessors!(
        /// Bearer value (`Bearer <jwt>`) currently attached to the context.
        authorization,
        device_id,
        platform,
        client_version,
        channel_id,
        device_model,
        correlation_id,
        forwarded_for,
        /// Value of `Accept-Language`.
        language,
        request_id,
        user_agent,
        user_ref_id,
        cif_no,
        segment,
        /// Mobile number OTPs are sent to.
        otp_mobile_no,
        /// National id.
        cid,
        passport_no,
        /// Raw `loginScope` claim. See [`RequestContext::scope`] for the parsed form.
        login_scope,
        bo_user_full_name,
        bo_user_id,
        api_key,
        dopa_ref_id,
        cbs_ref_id,
        any_id_req_id,
        os_version,
        trace,
        span_id,
    );

    pub(crate) fn set_authorization(&mut self, bearer: String) {
        self.authorization = bearer;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn track(&mut self, changed: bool) -> &mut Self {
        if changed {
            self.dirty = true;
        }
        self
    }

    pub fn set_user_ref_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.user_ref_id, val);
        self.track(changed)
    }

    pub fn set_cif_no(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.cif_no, val);
        self.track(changed)
    }

    pub fn set_segment(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.segment, val);
        self.track(changed)
    }

    pub fn set_otp_mobile_no(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.otp_mobile_no, val);
        self.track(changed)
    }

    pub fn set_cid(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.cid, val);
        self.track(changed)
    }

    pub fn set_passport_no(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.passport_no, val);
        self.track(changed)
    }

    pub fn set_login_scope(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.login_scope, val);
        self.track(changed)
    }

    /// Sets `loginScope` to the canonical string of `scope`.
    pub fn set_scope(&mut self, scope: LoginScope) -> &mut Self {
        self.set_login_scope(scope.as_str())
    }

    pub fn set_device_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.device_id, val);
        self.track(changed)
    }

    pub fn set_bo_user_full_name(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.bo_user_full_name, val);
        self.track(changed)
    }

    pub fn set_bo_user_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.bo_user_id, val);
        self.track(changed)
    }

    pub fn set_language(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.language, val);
        self.track(changed)
    }

    pub fn set_request_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.request_id, val);
        self.track(changed)
    }

    pub fn set_correlation_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.correlation_id, val);
        self.track(changed)
    }

    pub fn set_forwarded_for(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.forwarded_for, val);
        self.track(changed)
    }

    pub fn set_user_agent(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.user_agent, val);
        self.track(changed)
    }

    pub fn set_platform(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.platform, val);
        self.track(changed)
    }

    pub fn set_client_version(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.client_version, val);
        self.track(changed)
    }

    pub fn set_channel_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.channel_id, val);
        self.track(changed)
    }

    pub fn set_api_key(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.api_key, val);
        self.track(changed)
    }

    pub fn set_dopa_ref_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.dopa_ref_id, val);
        self.track(changed)
    }

    pub fn set_cbs_ref_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.cbs_ref_id, val);
        self.track(changed)
    }

    pub fn set_any_id_req_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.any_id_req_id, val);
        self.track(changed)
    }

    pub fn set_device_model(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.device_model, val);
        self.track(changed)
    }

    pub fn set_os_version(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.os_version, val);
        self.track(changed)
    }

    pub fn set_trace(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.trace, val);
        self.track(changed)
    }

    pub fn set_span_id(&mut self, val: &str) -> &mut Self {
        let changed = replace_if_changed(&mut self.span_id, val);
        self.track(changed)
    }

    /// Overwrites every claim present in `patch`. Does not touch `dirty`.
    pub(crate) fn merge(&mut self, patch: ClaimsPatch) {
        self.claims.merge(patch.claims);
        overwrite(&mut self.device_id, patch.device_id);
        overwrite(&mut self.platform, patch.platform);
        overwrite(&mut self.client_version, patch.client_version);
        overwrite(&mut self.channel_id, patch.channel_id);
        overwrite(&mut self.device_model, patch.device_model);
        overwrite(&mut self.correlation_id, patch.correlation_id);
        overwrite(&mut self.forwarded_for, patch.forwarded_for);
        overwrite(&mut self.language, patch.language);
        overwrite(&mut self.request_id, patch.request_id);
        overwrite(&mut self.user_agent, patch.user_agent);
        overwrite(&mut self.user_ref_id, patch.user_ref_id);
        overwrite(&mut self.cif_no, patch.cif_no);
        overwrite(&mut self.segment, patch.segment);
        overwrite(&mut self.otp_mobile_no, patch.otp_mobile_no);
        overwrite(&mut self.cid, patch.cid);
        overwrite(&mut self.passport_no, patch.passport_no);
        overwrite(&mut self.login_scope, patch.login_scope);
        overwrite(&mut self.bo_user_full_name, patch.bo_user_full_name);
        overwrite(&mut self.bo_user_id, patch.bo_user_id);
        overwrite(&mut self.api_key, patch.api_key);
        overwrite(&mut self.dopa_ref_id, patch.dopa_ref_id);
        overwrite(&mut self.cbs_ref_id, patch.cbs_ref_id);
        overwrite(&mut self.any_id_req_id, patch.any_id_req_id);
        overwrite(&mut self.os_version, patch.os_version);
        overwrite(&mut self.trace, patch.trace);
        overwrite(&mut self.span_id, patch.span_id);
    }
}

impl Validate for RequestContext {
    fn validate_at(&self, now: i64) -> Result<(), ClaimsError> {
        self.claims.validate_at(now)
    }
}

impl StandardClaims {
    fn merge(&mut self, patch: StandardClaims) {
        if patch.audience.is_some() {
            self.audience = patch.audience;
        }
        if patch.expires_at.is_some() {
            self.expires_at = patch.expires_at;
        }
        if patch.id.is_some() {
            self.id = patch.id;
        }
        if patch.issued_at.is_some() {
            self.issued_at = patch.issued_at;
        }
        if patch.issuer.is_some() {
            self.issuer = patch.issuer;
        }
        if patch.not_before.is_some() {
            self.not_before = patch.not_before;
        }
        if patch.subject.is_some() {
            self.subject = patch.subject;
        }
    }
}

fn overwrite(slot: &mut String, val: Option<String>) {
    if let Some(val) = val {
        *slot = val;
    }
}

/// Claims decoded from a JWT payload, keeping track of which keys were present.
///
/// Unknown keys are ignored and `null` values count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClaimsPatch {
    #[serde(flatten)]
    claims: StandardClaims,

    #[serde(rename = "X-Device-ID")]
    device_id: Option<String>,
    #[serde(rename = "X-Platform")]
    platform: Option<String>,
    #[serde(rename = "X-Client-Version")]
    client_version: Option<String>,
    #[serde(rename = "X-Channel-ID")]
    channel_id: Option<String>,
    #[serde(rename = "X-Device-Model")]
    device_model: Option<String>,
    #[serde(rename = "X-Correlation-ID")]
    correlation_id: Option<String>,
    #[serde(rename = "X-Forwarded-For")]
    forwarded_for: Option<String>,
    #[serde(rename = "Accept-Language")]
    language: Option<String>,
    request_id: Option<String>,
    user_agent: Option<String>,

    user_ref_id: Option<String>,
    cif_no: Option<String>,
    segment: Option<String>,
    otp_mobile_no: Option<String>,
    cid: Option<String>,
    passport_no: Option<String>,
    login_scope: Option<String>,
    bo_user_full_name: Option<String>,
    bo_user_id: Option<String>,
    api_key: Option<String>,
    dopa_ref_id: Option<String>,
    cbs_ref_id: Option<String>,
    any_id_req_id: Option<String>,
    os_version: Option<String>,
    trace: Option<String>,
    span_id: Option<String>,
}

/// Every payload key [`ClaimsPatch`] reads, spelled as serialized.
const CLAIM_KEYS: &[&str] = &[
    "aud",
    "exp",
    "jti",
    "iat",
    "iss",
    "nbf",
    "sub",
    "X-Device-ID",
    "X-Platform",
    "X-Client-Version",
    "X-Channel-ID",
    "X-Device-Model",
    "X-Correlation-ID",
    "X-Forwarded-For",
    "Accept-Language",
    "requestId",
    "userAgent",
    "userRefId",
    "cifNo",
    "segment",
    "otpMobileNo",
    "cid",
    "passportNo",
    "loginScope",
    "boUserFullName",
    "boUserId",
    "apiKey",
    "dopaRefId",
    "cbsRefId",
    "anyIdReqId",
    "osVersion",
    "trace",
    "spanId",
];

fn canonical_key(key: &str) -> Option<&'static str> {
    CLAIM_KEYS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(key))
}

impl ClaimsPatch {
    /// Decodes a payload. Keys match ignoring ASCII case; when a payload
    /// carries both the exact spelling and a differently cased one, the
    /// exact spelling wins.
    pub(crate) fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let fields = match serde_json::from_slice(bytes)? {
            serde_json::Value::Object(fields) => fields,
            other => return serde_json::from_value(other),
        };

        let mut normalized = serde_json::Map::with_capacity(fields.len());
        let mut folded = Vec::new();
        for (key, val) in fields {
            match canonical_key(&key) {
                Some(canonical) if canonical != key => folded.push((canonical, val)),
                _ => {
                    normalized.insert(key, val);
                }
            }
        }
        for (canonical, val) in folded {
            normalized.entry(canonical).or_insert(val);
        }
        serde_json::from_value(serde_json::Value::Object(normalized))
    }
}
