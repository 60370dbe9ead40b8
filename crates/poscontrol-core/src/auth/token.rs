//! Unverified reading of bearer token claims.
//!
//! Tokens are JWTs: `header.payload.signature`, each segment base64url. Only
//! the payload is decoded, to read the self-declared `exp` claim so the client
//! can skip requests that would certainly be rejected. This is a heuristic.
//! Nothing here verifies the signature, and a forged token with a far-future
//! `exp` reads as valid.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token has no payload segment")]
    MissingPayload,

    #[error("Token payload is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Token payload is not a JSON object: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("Token has no numeric exp claim")]
    MissingExpiry,

    #[error("Token exp claim is out of range")]
    ExpiryOutOfRange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: Option<f64>,
    #[serde(default)]
    pub exp: Option<f64>,
}

/// Decode the payload segment of a JWT without verifying anything.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let payload = token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or(TokenError::MissingPayload)?;
    let trimmed = payload.trim_end_matches('=');
    // Some issuers use the standard alphabet; accept both.
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The instant the token declares itself expired.
pub fn expiry(token: &str) -> Result<DateTime<Utc>, TokenError> {
    let exp = decode_claims(token)?.exp.ok_or(TokenError::MissingExpiry)?;
    if !exp.is_finite() {
        return Err(TokenError::ExpiryOutOfRange);
    }
    DateTime::from_timestamp(exp.floor() as i64, 0).ok_or(TokenError::ExpiryOutOfRange)
}

/// Whether the token is expired at `now`. Any decode failure counts as
/// expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match expiry(token) {
        Ok(exp) => now >= exp,
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

#[cfg(test)]
pub(crate) fn make_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}
