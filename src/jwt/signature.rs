// src/jwt/signature.rs
//! Recoverable secp256k1 signatures as used by `ES256K` / `ES256K-R` tokens.
//!
//! Tokens do not name their key. The verifier recovers the signer's public
//! key from the signature itself, so the codec has to keep track of the
//! recovery id (explicitly for `ES256K-R`, by trial for `ES256K`).
//!
//! The signed digest is SHA-256 of the message bytes.

use crate::error::{Error, Result};
use crate::models::token::Algorithm;
use crate::utils::crypto::sha256;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};

/// Capability that signs a 32-byte digest and reports the recovery id.
///
/// Implemented by [`crate::wallet::key_management::KeyManager`]; hardware or
/// remote signers can implement it too.
pub trait JwtSigner {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature>;
}

/// Detached signature: `r`, `s` and, when known, the recovery id (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: Option<u8>,
}

impl Signature {
    /// Serializes to `r‖s` (ES256K) or `r‖s‖recoveryId` (ES256K-R).
    ///
    /// # Errors
    /// `InvalidSignature` when `ES256K-R` is requested but the signature has
    /// no recovery id.
    pub fn encode(&self, alg: Algorithm) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(alg.signature_len());
        bytes.extend_from_slice(&self.r);
        bytes.extend_from_slice(&self.s);
        if alg == Algorithm::ES256KR {
            let recovery_id = self.recovery_id.ok_or_else(|| {
                Error::InvalidSignature("ES256K-R encoding requires a recovery id".into())
            })?;
            bytes.push(recovery_id);
        }
        Ok(bytes)
    }

    /// Parses the encoding produced by [`Signature::encode`].
    ///
    /// The byte length must match `alg` exactly. For `ES256K-R` an
    /// Ethereum-style `v` of 27/28 is accepted and mapped to 0/1.
    pub fn decode(bytes: &[u8], alg: Algorithm) -> Result<Self> {
        if bytes.len() != alg.signature_len() {
            return Err(Error::MalformedSignature {
                alg: alg.to_string(),
                expected: alg.signature_len(),
                actual: bytes.len(),
            });
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        let recovery_id = match alg {
            Algorithm::ES256K => None,
            Algorithm::ES256KR => Some(match bytes[64] {
                v @ (0 | 1) => v,
                v @ (27 | 28) => v - 27,
                v => {
                    return Err(Error::InvalidSignature(format!(
                        "unsupported recovery id {v}"
                    )))
                }
            }),
        };

        Ok(Signature { r, s, recovery_id })
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        EcdsaSignature::from_slice(&bytes)
            .map_err(|e| Error::InvalidSignature(format!("r or s out of range: {e}")))
    }
}

/// Signs `message` (hashed with SHA-256) through the given capability.
pub fn sign<S: JwtSigner + ?Sized>(signer: &S, message: &[u8]) -> Result<Signature> {
    signer.sign_digest(&sha256(message))
}

/// Recovers the public key that produced `signature` over `message`.
///
/// With a recovery id this is a single recovery. Without one, both ids are
/// tried and the unique candidate that recovers and verifies is returned;
/// if neither or both do, recovery is ambiguous and fails.
///
/// For a genuine secp256k1 signature both ids recover a key that verifies,
/// so keyless recovery on its own always fails as ambiguous. Callers
/// without a recovery id have to take [`recovery_candidates`] and pick the
/// one an authority (the registry) accepts, as token verification does.
pub fn recover_public_key(message: &[u8], signature: &Signature) -> Result<VerifyingKey> {
    let digest = sha256(message);
    match signature.recovery_id {
        Some(id) => recover_with_id(&digest, signature, id),
        None => {
            let mut candidates = recovery_candidates(message, signature);
            match candidates.len() {
                1 => Ok(candidates.remove(0).1),
                0 => Err(Error::InvalidSignature(
                    "no recovery id yields a valid public key".into(),
                )),
                _ => Err(Error::InvalidSignature(
                    "recovery is ambiguous without a recovery id".into(),
                )),
            }
        }
    }
}

/// Every `(recovery id, public key)` pair in `{0, 1}` that recovers to a
/// key which verifies `signature` over `message`.
pub fn recovery_candidates(message: &[u8], signature: &Signature) -> Vec<(u8, VerifyingKey)> {
    let digest = sha256(message);
    [0u8, 1]
        .into_iter()
        .filter_map(|id| {
            recover_with_id(&digest, signature, id)
                .ok()
                .map(|key| (id, key))
        })
        .collect()
}

fn recover_with_id(digest: &[u8; 32], signature: &Signature, id: u8) -> Result<VerifyingKey> {
    let mut recovery_id = RecoveryId::from_byte(id)
        .ok_or_else(|| Error::InvalidSignature(format!("unsupported recovery id {id}")))?;
    let mut ecdsa = signature.to_ecdsa()?;

    // high-S signatures recover the same key with the parity flipped
    if let Some(normalized) = ecdsa.normalize_s() {
        ecdsa = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &ecdsa, recovery_id)
        .map_err(|e| Error::InvalidSignature(format!("public key recovery failed: {e}")))?;
    key.verify_prehash(digest, &ecdsa)
        .map_err(|e| Error::InvalidSignature(format!("recovered key does not verify: {e}")))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::key_management::KeyManager;

    fn key_for(seed: usize) -> KeyManager {
        let secret = sha256(format!("super secret {seed}").as_bytes());
        KeyManager::from_private_key(&ethers::utils::hex::encode(secret)).unwrap()
    }

    #[test]
    fn recovers_signer_public_key() {
        for i in 0..8 {
            let key = key_for(i);
            for j in 0..8 {
                let message = format!("hello {i} {j}");
                let signature = sign(&key, message.as_bytes()).unwrap();
                let recovered = recover_public_key(message.as_bytes(), &signature).unwrap();
                assert_eq!(recovered, key.public_key(), "failed at key {i}, message {j}");
            }
        }
    }

    #[test]
    fn candidates_contain_signer_when_recovery_id_is_dropped() {
        let key = key_for(42);
        let message = b"plain ES256K";
        let mut signature = sign(&key, message).unwrap();
        let id = signature.recovery_id.take().unwrap();

        let candidates = recovery_candidates(message, &signature);
        assert!(candidates
            .iter()
            .any(|(candidate_id, candidate)| *candidate_id == id && *candidate == key.public_key()));
    }

    #[test]
    fn keyless_recovery_is_ambiguous() {
        for i in 0..8 {
            let key = key_for(100 + i);
            let message = format!("no id {i}");
            let mut signature = sign(&key, message.as_bytes()).unwrap();
            signature.recovery_id = None;

            let candidates = recovery_candidates(message.as_bytes(), &signature);
            assert_eq!(candidates.len(), 2, "both ids should recover at {i}");
            assert!(candidates.iter().any(|(_, k)| *k == key.public_key()));

            assert!(matches!(
                recover_public_key(message.as_bytes(), &signature),
                Err(Error::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn wrong_message_recovers_different_key() {
        let key = key_for(7);
        let signature = sign(&key, b"original").unwrap();
        let recovered = recover_public_key(b"tampered", &signature);
        assert!(recovered.map(|k| k != key.public_key()).unwrap_or(true));
    }

    #[test]
    fn encodes_fixed_sizes() {
        let key = key_for(1);
        let signature = sign(&key, b"size").unwrap();
        assert_eq!(signature.encode(Algorithm::ES256K).unwrap().len(), 64);
        let recoverable = signature.encode(Algorithm::ES256KR).unwrap();
        assert_eq!(recoverable.len(), 65);
        assert_eq!(Signature::decode(&recoverable, Algorithm::ES256KR).unwrap(), signature);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        for (len, alg) in [(65, Algorithm::ES256K), (64, Algorithm::ES256KR), (0, Algorithm::ES256K)] {
            match Signature::decode(&vec![1u8; len], alg) {
                Err(Error::MalformedSignature { expected, actual, .. }) => {
                    assert_eq!(expected, alg.signature_len());
                    assert_eq!(actual, len);
                }
                other => panic!("expected MalformedSignature, got {other:?}"),
            }
        }
    }

    #[test]
    fn decode_maps_ethereum_v() {
        let mut bytes = vec![1u8; 65];
        bytes[64] = 28;
        let signature = Signature::decode(&bytes, Algorithm::ES256KR).unwrap();
        assert_eq!(signature.recovery_id, Some(1));

        bytes[64] = 5;
        assert!(matches!(
            Signature::decode(&bytes, Algorithm::ES256KR),
            Err(Error::InvalidSignature(_))
        ));
    }

    #[test]
    fn encode_without_recovery_id_fails_for_recoverable_alg() {
        let signature = Signature {
            r: [1; 32],
            s: [2; 32],
            recovery_id: None,
        };
        assert!(signature.encode(Algorithm::ES256K).is_ok());
        assert!(matches!(
            signature.encode(Algorithm::ES256KR),
            Err(Error::InvalidSignature(_))
        ));
    }
}
