// src/models/token.rs
//! Token header and payload model.
//!
//! A token is `header.payload.signature`, each segment base64url encoded.
//! The payload is an arbitrary JSON object: claims this crate knows about
//! (`iss`, `iat`, `exp`) sit next to whatever else the issuer put there.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token payload: an ordered map of claim name to JSON value.
///
/// `serde_json` is built with `preserve_order`, so claims keep insertion
/// order and anything this crate encoded re-encodes byte-for-byte. Foreign
/// numbers outside `i64`/`u64`/`f64` notation (`1e2`, 30-digit integers)
/// come back normalized; verification never re-encodes, it checks the
/// segments exactly as received.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Issuer claim, holds the identity the token speaks for.
pub const ISSUER_CLAIM: &str = "iss";
/// Issued-at claim, seconds since the epoch.
pub const ISSUED_AT_CLAIM: &str = "iat";
/// Expiry claim, seconds since the epoch.
pub const EXPIRY_CLAIM: &str = "exp";

/// Signature algorithm of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Plain secp256k1 signature, `r‖s`. The recovery id is found by trial.
    #[serde(rename = "ES256K")]
    ES256K,
    /// Recoverable secp256k1 signature, `r‖s‖recoveryId`.
    #[serde(rename = "ES256K-R")]
    ES256KR,
}

impl Algorithm {
    /// Wire name used in the `alg` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::ES256K => "ES256K",
            Algorithm::ES256KR => "ES256K-R",
        }
    }

    /// Exact size of the encoded signature for this algorithm.
    pub fn signature_len(&self) -> usize {
        match self {
            Algorithm::ES256K => 64,
            Algorithm::ES256KR => 65,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256K" => Ok(Algorithm::ES256K),
            "ES256K-R" => Ok(Algorithm::ES256KR),
            other => Err(format!("unsupported algorithm {other}")),
        }
    }
}

/// Standard JWT header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub typ: String,
    pub alg: Algorithm,
}

impl JwtHeader {
    pub fn new(alg: Algorithm) -> Self {
        JwtHeader {
            typ: "JWT".to_string(),
            alg,
        }
    }
}

impl Default for JwtHeader {
    fn default() -> Self {
        JwtHeader::new(Algorithm::ES256K)
    }
}
