// src/jwt/token.rs
//! Token codec: build, parse and verify `header.payload.signature` tokens.
//!
//! Building and parsing are pure and synchronous. Verification is async
//! because the recovered signer has to be checked against the registry
//! through an [`IdentityResolver`].
//!
//! # Verification order
//! 1. parse the framing, JSON and signature bytes
//! 2. recover the signer's public key and derive its address
//! 3. ask the resolver whether that address may sign for `iss`
//! 4. reject the token if its `exp` claim has elapsed

use crate::error::{Error, Result};
use crate::jwt::signature::{self, recover_public_key, recovery_candidates, JwtSigner, Signature};
use crate::models::did::normalize_did;
use crate::models::token::{
    Algorithm, JwtHeader, Payload, EXPIRY_CLAIM, ISSUED_AT_CLAIM, ISSUER_CLAIM,
};
use crate::services::resolver::IdentityResolver;
use crate::utils::crypto::public_key_to_address;
use crate::utils::serialization::{base64url_decode, base64url_encode, deserialize, serialize};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::{debug, info};
use serde_json::Value;

/// A parsed, not yet verified, token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub header: JwtHeader,
    pub payload: Payload,
    pub signature: Signature,
    /// `base64url(header).base64url(payload)` exactly as received
    pub signing_input: String,
}

impl Token {
    /// The `iss` claim.
    pub fn issuer(&self) -> Result<&str> {
        self.payload
            .get(ISSUER_CLAIM)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedToken("missing iss claim".into()))
    }

    /// The `exp` claim in seconds since the epoch, if present.
    pub fn expires_at(&self) -> Result<Option<i64>> {
        match self.payload.get(EXPIRY_CLAIM) {
            None | Some(Value::Null) => Ok(None),
            Some(exp) => exp
                .as_i64()
                .or_else(|| exp.as_f64().map(|secs| secs as i64))
                .map(Some)
                .ok_or_else(|| Error::MalformedToken("exp claim is not a number".into())),
        }
    }
}

/// Builds and signs a token.
///
/// Header and payload are serialized to compact JSON and base64url encoded
/// without padding; the signature covers `header.payload`.
pub fn build<S: JwtSigner + ?Sized>(payload: &Payload, alg: Algorithm, signer: &S) -> Result<String> {
    let header = JwtHeader::new(alg);
    let signing_input = format!(
        "{}.{}",
        base64url_encode(&serialize(&header)?),
        base64url_encode(&serialize(payload)?)
    );
    let signature = signature::sign(signer, signing_input.as_bytes())?;
    let signature = base64url_encode(&signature.encode(alg)?);
    Ok(format!("{signing_input}.{signature}"))
}

/// Issues a token for `issuer`.
///
/// Adds the normalized `iss`, `iat` = `now` and, when `expires_in` is given,
/// `exp` = `now + expires_in` to `claims` before building.
pub fn create_token<S: JwtSigner + ?Sized>(
    mut claims: Payload,
    issuer: &str,
    signer: &S,
    alg: Algorithm,
    expires_in: Option<u64>,
    now: DateTime<Utc>,
) -> Result<String> {
    let issued_at = now.timestamp();
    claims.insert(ISSUED_AT_CLAIM.into(), Value::from(issued_at));
    if let Some(expires_in) = expires_in {
        let expires_in = i64::try_from(expires_in)
            .map_err(|_| Error::MalformedToken(format!("expiry {expires_in} is out of range")))?;
        claims.insert(EXPIRY_CLAIM.into(), Value::from(issued_at.saturating_add(expires_in)));
    }
    claims.insert(ISSUER_CLAIM.into(), Value::from(normalize_did(issuer)));
    build(&claims, alg, signer)
}

/// Splits and decodes a token without checking its signature.
///
/// # Errors
/// - `MalformedToken` for anything but three `.`-separated segments, or a
///   segment that is not unpadded base64url / valid JSON object
/// - `MalformedSignature` if the signature size does not match `alg`
pub fn parse(token: &str) -> Result<Token> {
    let segments: Vec<&str> = token.split('.').collect();
    let [encoded_header, encoded_payload, encoded_signature] = segments.as_slice() else {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header: JwtHeader = deserialize(&base64url_decode(encoded_header)?)?;
    let payload: Payload = deserialize(&base64url_decode(encoded_payload)?)?;
    let signature = Signature::decode(&base64url_decode(encoded_signature)?, header.alg)?;

    Ok(Token {
        header,
        payload,
        signature,
        signing_input: format!("{encoded_header}.{encoded_payload}"),
    })
}

/// Verifies a token at the current time. See [`verify_at`].
pub async fn verify<R: IdentityResolver + ?Sized>(token: &str, resolver: &R) -> Result<Payload> {
    verify_at(token, resolver, Utc::now()).await
}

/// Verifies a token as of `now` and returns its payload.
///
/// For `ES256K-R` the signer is recovered directly. For `ES256K` both
/// recovery ids are tried and exactly one candidate must be authorized.
///
/// # Errors
/// - `MalformedToken` / `MalformedSignature` from parsing, or a missing `iss`
/// - `InvalidSignature` if no key can be recovered
/// - `UnauthorizedSigner` if the signer is not owner (or valid delegate)
/// - `ExpiredToken` if `exp <= now`
/// - `RegistryCall` if the resolver could not reach the registry
pub async fn verify_at<R: IdentityResolver + ?Sized>(
    token: &str,
    resolver: &R,
    now: DateTime<Utc>,
) -> Result<Payload> {
    let token = parse(token)?;
    let identity = token.issuer()?.to_string();
    let message = token.signing_input.as_bytes();

    let signer = match token.header.alg {
        Algorithm::ES256KR => {
            let key = recover_public_key(message, &token.signature)?;
            let signer = public_key_to_address(&key);
            if !resolver.is_authorized_signer(&identity, signer, now).await? {
                return Err(Error::UnauthorizedSigner { identity, signer });
            }
            signer
        }
        Algorithm::ES256K => {
            let candidates: Vec<Address> = recovery_candidates(message, &token.signature)
                .iter()
                .map(|(_, key)| public_key_to_address(key))
                .collect();
            let Some(first) = candidates.first().copied() else {
                return Err(Error::InvalidSignature(
                    "no recovery id yields a valid public key".into(),
                ));
            };

            let mut authorized = Vec::new();
            for candidate in candidates {
                if resolver.is_authorized_signer(&identity, candidate, now).await? {
                    authorized.push(candidate);
                }
            }
            match authorized.as_slice() {
                [signer] => *signer,
                [] => {
                    return Err(Error::UnauthorizedSigner {
                        identity,
                        signer: first,
                    })
                }
                _ => {
                    return Err(Error::InvalidSignature(
                        "more than one recovered key is authorized".into(),
                    ))
                }
            }
        }
    };

    if let Some(expired_at) = token.expires_at()? {
        let now = now.timestamp();
        if now >= expired_at {
            debug!("token from {identity} expired at {expired_at}");
            return Err(Error::ExpiredToken { expired_at, now });
        }
    }

    info!("verified {} token from {identity} signed by {signer:?}", token.header.alg);
    Ok(token.payload)
}
