//! HS256 JWT issue and verify.
//!
//! Tokens are the standard three base64url-no-pad segments. The only
//! accepted algorithm is HMAC-SHA256 with the configured secret; the header
//! is fixed rather than parsed, so algorithm-confusion inputs fail the
//! signature check.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`, already base64url encoded.
const HEADER_B64: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    /// User id the token was issued to.
    pub sub: i64,
    /// Issued-at, seconds since the unix epoch.
    pub iat: u64,
    /// Expiry, seconds since the unix epoch.
    pub exp: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid base64 in token: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid claims JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signature mismatch")]
    Signature,

    #[error("token expired")]
    Expired,
}

/// Sign claims into a compact JWT.
pub fn issue_token(secret: &str, claims: &Claims) -> String {
    let payload = serde_json::to_vec(claims).expect("claims serialize to JSON");
    let signing_input = format!("{HEADER_B64}.{}", URL_SAFE_NO_PAD.encode(payload));

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{signing_input}.{signature}")
}

/// Verify signature and expiry, returning the claims. The signature check is
/// constant-time via `Mac::verify_slice`.
pub fn verify_token(secret: &str, token: &str, now: u64) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (header, payload, signature) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => return Err(TokenError::Malformed),
    };

    if header != HEADER_B64 {
        return Err(TokenError::Malformed);
    }

    let signature = URL_SAFE_NO_PAD.decode(signature)?;
    let signing_input = format!("{header}.{payload}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::Signature)?;

    let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
