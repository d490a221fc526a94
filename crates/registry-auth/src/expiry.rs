//! Best-effort token expiry decoding
//!
//! Tokens are opaque to the request path. Session restore is the one place
//! that peeks inside: if the token looks like `header.payload.signature` and
//! the payload is base64url JSON with a numeric `exp` (epoch seconds), a past
//! `exp` means the stored session is stale. Anything that fails to decode is
//! treated as "no expiry known", never as an error.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Expiry decoded from a token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryInfo {
    /// Unix timestamp in seconds
    pub expires_at: u64,
}

impl ExpiryInfo {
    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        self.expires_at < now_secs
    }
}

/// Decode the `exp` claim from a token, if there is one.
pub fn decode_expiry(token: &str) -> Option<ExpiryInfo> {
    let payload = token.split('.').nth(1)?;
    // Accept standard-alphabet and padded encodings as well
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    let expires_at = exp
        .as_u64()
        .or_else(|| exp.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))?;
    Some(ExpiryInfo { expires_at })
}

/// Whether the token is known to be expired at `now_secs`.
///
/// Unknown expiry counts as not expired.
pub fn is_expired(token: &str, now_secs: u64) -> bool {
    decode_expiry(token).is_some_and(|info| info.is_expired_at(now_secs))
}
