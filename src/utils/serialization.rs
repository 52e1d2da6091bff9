// src/utils/serialization.rs
//! Serialization utilities for the token wire format.
//!
//! Provides:
//! - compact JSON encoding/decoding of token segments
//! - unpadded base64url encoding/decoding of segment bytes

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Serializes a value to compact JSON bytes.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Returns
/// - `Ok(Vec<u8>)` with the compact JSON representation
/// - `Err(Error::MalformedToken)` if serialization fails
pub fn serialize<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(data).map_err(|e| Error::MalformedToken(format!("JSON encoding failed: {e}")))
}

/// Deserializes a value from JSON bytes.
///
/// # Arguments
/// * `data` - JSON bytes to deserialize
///
/// # Returns
/// - `Ok(T)` with deserialized value on success
/// - `Err(Error::MalformedToken)` if the bytes are not valid JSON for `T`
pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::MalformedToken(format!("JSON decoding failed: {e}")))
}

/// Encodes bytes as base64url without padding.
pub fn base64url_encode(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes an unpadded base64url segment.
///
/// Padding characters are rejected outright rather than tolerated.
pub fn base64url_decode(segment: &str) -> Result<Vec<u8>> {
    if segment.contains('=') {
        return Err(Error::MalformedToken(
            "padding characters are not allowed in base64url segments".into(),
        ));
    }
    base64::decode_config(segment, base64::URL_SAFE_NO_PAD)
        .map_err(|e| Error::MalformedToken(format!("base64url decoding failed: {e}")))
}
