//! Bearer token extraction and JWT payload decoding.
//!
//! The inbound token is not verified here: this layer sits behind a gateway
//! that already checked the signature, and only needs the claims. The
//! payload segment is base64-decoded and merged into a [`RequestContext`],
//! then a fixed set of request headers is layered on top.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, AUTHORIZATION, USER_AGENT};
use tracing::{debug, warn};

use crate::context::{ClaimsPatch, RequestContext};
use crate::error::ExtractError;

pub const X_AUTHORIZATION: HeaderName = HeaderName::from_static("x-authorization");
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");
pub const X_DEVICE_ID: HeaderName = HeaderName::from_static("x-device-id");
pub const X_DEVICE_MODEL: HeaderName = HeaderName::from_static("x-device-model");
pub const X_CHANNEL_ID: HeaderName = HeaderName::from_static("x-channel-id");
pub const X_CLIENT_VERSION: HeaderName = HeaderName::from_static("x-client-version");
pub const X_PLATFORM: HeaderName = HeaderName::from_static("x-platform");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const TRACE: HeaderName = HeaderName::from_static("trace");
pub const SPAN_ID: HeaderName = HeaderName::from_static("spanid");

/// Prefix stripped from the authorization value before splitting the JWT.
pub const BEARER_PREFIX: &str = "Bearer ";

/// The request headers extraction reads, bound to owned strings.
///
/// Absent headers bind to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundHeaders {
    pub x_authorization: String,
    pub authorization: String,
    pub language: String,
    pub correlation_id: String,
    pub device_id: String,
    pub device_model: String,
    pub channel_id: String,
    pub client_version: String,
    pub platform: String,
    pub forwarded_for: String,
    pub user_agent: String,
    pub trace: String,
    pub span_id: String,
}

impl InboundHeaders {
    /// Reads every header extraction cares about. The first value wins when
    /// a header repeats.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::HeaderBinding`] if a present header value is
    /// not valid UTF-8.
    pub fn bind(headers: &HeaderMap) -> Result<Self, ExtractError> {
        Ok(Self {
            x_authorization: read(headers, &X_AUTHORIZATION, "X-Authorization")?,
            authorization: read(headers, &AUTHORIZATION, "Authorization")?,
            language: read(headers, &ACCEPT_LANGUAGE, "Accept-Language")?,
            correlation_id: read(headers, &X_CORRELATION_ID, "X-Correlation-ID")?,
            device_id: read(headers, &X_DEVICE_ID, "X-Device-ID")?,
            device_model: read(headers, &X_DEVICE_MODEL, "X-Device-Model")?,
            channel_id: read(headers, &X_CHANNEL_ID, "X-Channel-ID")?,
            client_version: read(headers, &X_CLIENT_VERSION, "X-Client-Version")?,
            platform: read(headers, &X_PLATFORM, "X-Platform")?,
            forwarded_for: read(headers, &X_FORWARDED_FOR, "X-Forwarded-For")?,
            user_agent: read(headers, &USER_AGENT, "User-Agent")?,
            trace: read(headers, &TRACE, "trace")?,
            span_id: read(headers, &SPAN_ID, "spanId")?,
        })
    }

    /// `X-Authorization` if present, otherwise `Authorization`.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        if !self.x_authorization.is_empty() {
            Some(&self.x_authorization)
        } else if !self.authorization.is_empty() {
            Some(&self.authorization)
        } else {
            None
        }
    }
}

fn read(headers: &HeaderMap, name: &HeaderName, label: &'static str) -> Result<String, ExtractError> {
    match headers.get(name) {
        None => Ok(String::new()),
        Some(value) => std::str::from_utf8(value.as_bytes())
            .map(str::to_owned)
            .map_err(|e| ExtractError::HeaderBinding {
                name: label,
                reason: e.to_string(),
            }),
    }
}

/// Splits a compact JWT into its three segments.
///
/// # Errors
///
/// Returns [`ExtractError::MalformedToken`] unless there are exactly three.
pub fn split_compact(token: &str) -> Result<[&str; 3], ExtractError> {
    let segments: Vec<&str> = token.split('.').collect();
    match segments.as_slice() {
        [header, payload, signature] => Ok([*header, *payload, *signature]),
        other => Err(ExtractError::MalformedToken {
            segments: other.len(),
        }),
    }
}

/// Appends `=` until the length is a multiple of four.
#[must_use]
pub fn pad_base64(segment: &str) -> String {
    let mut padded = segment.to_owned();
    let rem = padded.len() % 4;
    if rem != 0 {
        padded.push_str(&"=".repeat(4 - rem));
    }
    padded
}

/// Decodes the payload segment of a compact JWT.
///
/// JWT segments use the URL-safe alphabet; tokens minted with the standard
/// alphabet are accepted as well.
///
/// # Errors
///
/// [`ExtractError::MalformedToken`] for a wrong segment count,
/// [`ExtractError::Base64Decode`] if the payload is not base64.
pub fn decode_payload(token: &str) -> Result<Vec<u8>, ExtractError> {
    let [_, payload, _] = split_compact(token)?;
    let padded = pad_base64(payload);
    match URL_SAFE.decode(&padded) {
        Ok(bytes) => Ok(bytes),
        Err(_) => Ok(STANDARD.decode(&padded)?),
    }
}

/// Builds the request context from inbound headers.
///
/// `existing` is a context already published for this request; its values
/// are the base the token claims and headers are merged onto. It is never
/// modified, so a failed extraction leaves no partial state behind.
///
/// # Errors
///
/// Any [`ExtractError`]; see the variant docs for when each applies.
pub fn extract_context(
    headers: &HeaderMap,
    existing: Option<&RequestContext>,
) -> Result<RequestContext, ExtractError> {
    let bound = InboundHeaders::bind(headers)?;

    let Some(auth) = bound.bearer() else {
        warn!("x-authorization & authorization headers are absent, request context will not be set");
        return Err(ExtractError::MissingAuthorization);
    };

    let token = auth.strip_prefix(BEARER_PREFIX).unwrap_or(auth);
    let json = match decode_payload(token) {
        Ok(json) => json,
        Err(e @ ExtractError::MalformedToken { .. }) => {
            warn!(error = %e, "invalid jwt format, request context will not be set");
            return Err(e);
        }
        Err(e) => {
            tracing::error!(error = %e, "jwt payload cannot be decoded");
            return Err(e);
        }
    };
    let patch = ClaimsPatch::from_json(&json).map_err(|e| {
        tracing::error!(error = %e, "jwt payload cannot be deserialized");
        ExtractError::from(e)
    })?;

    let mut ctx = existing.cloned().unwrap_or_default();
    ctx.merge(patch);
    ctx.set_authorization(auth.to_owned());
    merge_headers(&bound, &mut ctx);

    debug!(login_scope = %ctx.login_scope(), "request context extracted");
    Ok(ctx)
}

/// Copies non-empty header values onto the context. Does not touch `dirty`.
fn merge_headers(bound: &InboundHeaders, ctx: &mut RequestContext) {
    let pairs: [(&String, &mut String); 11] = [
        (&bound.language, &mut ctx.language),
        (&bound.correlation_id, &mut ctx.correlation_id),
        (&bound.device_id, &mut ctx.device_id),
        (&bound.device_model, &mut ctx.device_model),
        (&bound.channel_id, &mut ctx.channel_id),
        (&bound.client_version, &mut ctx.client_version),
        (&bound.platform, &mut ctx.platform),
        (&bound.forwarded_for, &mut ctx.forwarded_for),
        (&bound.user_agent, &mut ctx.user_agent),
        (&bound.trace, &mut ctx.trace),
        (&bound.span_id, &mut ctx.span_id),
    ];
    for (incoming, slot) in pairs {
        if !incoming.is_empty() {
            slot.clone_from(incoming);
        }
    }
}

/// Headers to attach to a downstream call made on behalf of `ctx`.
///
/// `X-Authorization` carries the context's current bearer value, so repack
/// before calling this. Empty fields are left out; values that are not
/// valid header values are skipped with a warning.
#[must_use]
pub fn outbound_headers(ctx: &RequestContext) -> HeaderMap {
    let pairs = [
        (X_AUTHORIZATION, ctx.authorization()),
        (ACCEPT_LANGUAGE, ctx.language()),
        (X_CORRELATION_ID, ctx.correlation_id()),
        (X_DEVICE_ID, ctx.device_id()),
        (X_DEVICE_MODEL, ctx.device_model()),
        (X_CHANNEL_ID, ctx.channel_id()),
        (X_CLIENT_VERSION, ctx.client_version()),
        (X_PLATFORM, ctx.platform()),
        (X_FORWARDED_FOR, ctx.forwarded_for()),
        (USER_AGENT, ctx.user_agent()),
        (TRACE, ctx.trace()),
        (SPAN_ID, ctx.span_id()),
    ];

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        if value.is_empty() {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(name, v);
            }
            Err(_) => warn!(header = %name, "context value is not a valid header value, skipping"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(payload: &str) -> String {
        format!("h.{}.s", URL_SAFE.encode(payload).trim_end_matches('='))
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn extracts_claims_from_x_authorization() {
        let bearer = format!("Bearer {}", token_for(r#"{"loginScope":"pin","cifNo":"123"}"#));
        let ctx = extract_context(&headers(&[("X-Authorization", &bearer)]), None).unwrap();
        assert_eq!(ctx.login_scope(), "pin");
        assert_eq!(ctx.cif_no(), "123");
        assert_eq!(ctx.authorization(), bearer);
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn falls_back_to_authorization() {
        let bearer = format!("Bearer {}", token_for(r#"{"cifNo":"9"}"#));
        let ctx = extract_context(&headers(&[("authorization", &bearer)]), None).unwrap();
        assert_eq!(ctx.cif_no(), "9");
    }

    #[test]
    fn x_authorization_wins_over_authorization() {
        let primary = token_for(r#"{"cifNo":"primary"}"#);
        let fallback = token_for(r#"{"cifNo":"fallback"}"#);
        let ctx = extract_context(
            &headers(&[("Authorization", &fallback), ("X-Authorization", &primary)]),
            None,
        )
        .unwrap();
        assert_eq!(ctx.cif_no(), "primary");
        assert_eq!(ctx.authorization(), primary);
    }

    #[test]
    fn token_without_bearer_prefix_is_accepted() {
        let raw = token_for(r#"{"segment":"gold"}"#);
        let ctx = extract_context(&headers(&[("X-Authorization", &raw)]), None).unwrap();
        assert_eq!(ctx.segment(), "gold");
    }

    #[test]
    fn missing_authorization() {
        let err = extract_context(&headers(&[("X-Device-ID", "d")]), None).unwrap_err();
        assert!(matches!(err, ExtractError::MissingAuthorization));

        let err = extract_context(&headers(&[("Authorization", "")]), None).unwrap_err();
        assert!(matches!(err, ExtractError::MissingAuthorization));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let err = extract_context(&headers(&[("X-Authorization", "Bearer aaa.bbb")]), None)
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedToken { segments: 2 }));

        let err = extract_context(&headers(&[("X-Authorization", "Bearer a.b.c.d")]), None)
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedToken { segments: 4 }));

        let err = extract_context(&headers(&[("X-Authorization", "Bearer ")]), None).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedToken { segments: 1 }));
    }

    #[test]
    fn unpadded_payload_is_padded_before_decoding() {
        let payload = URL_SAFE.encode(r#"{"cifNo":"12"}"#);
        let unpadded = payload.trim_end_matches('=');
        assert_ne!(unpadded.len() % 4, 0);
        assert_eq!(pad_base64(unpadded), payload);

        let ctx = extract_context(
            &headers(&[("X-Authorization", &format!("Bearer h.{unpadded}.s"))]),
            None,
        )
        .unwrap();
        assert_eq!(ctx.cif_no(), "12");
    }

    #[test]
    fn standard_alphabet_payload_is_accepted() {
        // '?' encodes to '/' in the standard alphabet and '_' in the URL-safe one.
        let json = r#"{"userAgent":"???"}"#;
        let payload = STANDARD.encode(json);
        assert!(payload.contains('/'));
        let bytes = decode_payload(&format!("h.{payload}.s")).unwrap();
        assert_eq!(bytes, json.as_bytes());
    }

    #[test]
    fn invalid_base64_payload() {
        let err = extract_context(&headers(&[("X-Authorization", "Bearer h.!!!!.s")]), None)
            .unwrap_err();
        assert!(matches!(err, ExtractError::Base64Decode(_)));
    }

    #[test]
    fn invalid_json_payload() {
        let token = format!("h.{}.s", URL_SAFE.encode("not json"));
        let err = extract_context(&headers(&[("X-Authorization", &token)]), None).unwrap_err();
        assert!(matches!(err, ExtractError::PayloadDecode(_)));
    }

    #[test]
    fn utf8_header_values_are_kept() {
        let mut map = headers(&[("X-Authorization", &token_for(r#"{"loginScope":"pin"}"#))]);
        map.insert(
            USER_AGENT,
            HeaderValue::from_bytes("MyApp/1.0 (ไทย)".as_bytes()).unwrap(),
        );
        map.insert(
            X_DEVICE_MODEL,
            HeaderValue::from_bytes("Téléphone".as_bytes()).unwrap(),
        );

        let ctx = extract_context(&map, None).unwrap();
        assert_eq!(ctx.login_scope(), "pin");
        assert_eq!(ctx.user_agent(), "MyApp/1.0 (ไทย)");
        assert_eq!(ctx.device_model(), "Téléphone");
    }

    #[test]
    fn invalid_utf8_header_fails_binding() {
        let mut map = headers(&[("X-Authorization", &token_for("{}"))]);
        map.insert(X_DEVICE_ID, HeaderValue::from_bytes(b"d\xffx").unwrap());
        let err = extract_context(&map, None).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::HeaderBinding { name: "X-Device-ID", .. }
        ));
    }

    #[test]
    fn headers_override_claims_only_when_non_empty() {
        let token = token_for(r#"{"X-Device-ID":"from-token","X-Platform":"ios","trace":"t0"}"#);
        let ctx = extract_context(
            &headers(&[
                ("X-Authorization", &token),
                ("x-device-id", "from-header"),
                ("X-Platform", ""),
                ("Accept-Language", "th-TH"),
                ("X-Correlation-ID", "corr"),
                ("User-Agent", "app/1.0"),
                ("SPANID", "span-1"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(ctx.device_id(), "from-header");
        assert_eq!(ctx.platform(), "ios");
        assert_eq!(ctx.trace(), "t0");
        assert_eq!(ctx.language(), "th-TH");
        assert_eq!(ctx.correlation_id(), "corr");
        assert_eq!(ctx.user_agent(), "app/1.0");
        assert_eq!(ctx.span_id(), "span-1");
    }

    #[test]
    fn existing_context_is_merge_base() {
        let mut existing = RequestContext::new();
        existing.set_segment("gold").set_cif_no("old");
        let token = token_for(r#"{"cifNo":"new"}"#);
        let ctx = extract_context(&headers(&[("X-Authorization", &token)]), Some(&existing))
            .unwrap();
        assert_eq!(ctx.cif_no(), "new");
        assert_eq!(ctx.segment(), "gold");
        assert!(ctx.is_dirty());
        assert_eq!(existing.cif_no(), "old");
    }

    #[test]
    fn outbound_headers_mirror_context() {
        let token = token_for(r#"{"loginScope":"pin"}"#);
        let bearer = format!("Bearer {token}");
        let ctx = extract_context(
            &headers(&[
                ("X-Authorization", &bearer),
                ("X-Device-ID", "dev"),
                ("trace", "t"),
            ]),
            None,
        )
        .unwrap();
        let out = outbound_headers(&ctx);
        assert_eq!(out.get(&X_AUTHORIZATION).unwrap(), bearer.as_str());
        assert_eq!(out.get(&X_DEVICE_ID).unwrap(), "dev");
        assert_eq!(out.get(&TRACE).unwrap(), "t");
        assert!(out.get(&X_PLATFORM).is_none());
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn outbound_headers_skip_invalid_values() {
        let mut ctx = RequestContext::new();
        ctx.set_user_agent("line\nbreak").set_device_id("ok");
        let out = outbound_headers(&ctx);
        assert!(out.get(&USER_AGENT).is_none());
        assert_eq!(out.get(&X_DEVICE_ID).unwrap(), "ok");
    }
}
