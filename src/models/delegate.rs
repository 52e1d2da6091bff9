// src/models/delegate.rs
//! Delegate configuration for registry writes.

use crate::error::{Error, Result};
use std::fmt;

/// Default validity of delegates and attributes, in seconds (one day).
pub const DEFAULT_VALIDITY_SECS: u64 = 86_400;

/// Key-type tag used as the `bytes32` delegate type in the registry.
///
/// Known tags are provided as constructors; any other tag string is
/// accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DelegateType(pub String);

impl DelegateType {
    /// Default signing key type used by ethr identities
    pub fn secp256k1_verification_key_2018() -> Self {
        DelegateType("Secp256k1VerificationKey2018".into())
    }

    /// References a verification key from an authentication section
    pub fn secp256k1_signature_authentication_2018() -> Self {
        DelegateType("Secp256k1SignatureAuthentication2018".into())
    }

    pub fn secp256k1_signature_verification_key_2018() -> Self {
        DelegateType("Secp256k1SignatureVerificationKey2018".into())
    }

    pub fn ecdsa_public_key_secp256k1() -> Self {
        DelegateType("EcdsaPublicKeySecp256k1".into())
    }

    /// Encryption key type
    pub fn curve25519_encryption_public_key() -> Self {
        DelegateType("Curve25519EncryptionPublicKey".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UTF-8 bytes of the tag, right-padded with zeros to the registry's
    /// `bytes32` width.
    ///
    /// # Errors
    /// `InvalidArgument` if the tag is longer than 32 bytes.
    pub fn to_bytes32(&self) -> Result<[u8; 32]> {
        to_bytes32("delegate type", self.0.as_bytes())
    }
}

impl Default for DelegateType {
    fn default() -> Self {
        DelegateType::secp256k1_verification_key_2018()
    }
}

impl fmt::Display for DelegateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DelegateType {
    fn from(tag: &str) -> Self {
        DelegateType(tag.to_string())
    }
}

/// Right-pads bytes into a `bytes32` word. `what` names the argument in
/// the error when `data` does not fit.
pub fn to_bytes32(what: &str, data: &[u8]) -> Result<[u8; 32]> {
    if data.len() > 32 {
        return Err(Error::InvalidArgument {
            what: what.to_string(),
            len: data.len(),
        });
    }
    let mut word = [0u8; 32];
    word[..data.len()].copy_from_slice(data);
    Ok(word)
}

/// Options for `addDelegate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateOptions {
    pub delegate_type: DelegateType,
    /// Validity window in seconds from the block the write lands in.
    pub expires_in: u64,
}

impl Default for DelegateOptions {
    fn default() -> Self {
        DelegateOptions {
            delegate_type: DelegateType::default(),
            expires_in: DEFAULT_VALIDITY_SECS,
        }
    }
}
