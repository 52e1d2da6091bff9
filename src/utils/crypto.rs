// src/utils/crypto.rs
//! Hashing and address derivation helpers.
//!
//! Two digests are in play: Keccak-256 (Ethereum's hash, used for address
//! derivation and transactions) and SHA-256 (the digest signed by `ES256K`
//! tokens).

use ethers::types::Address;
use ethers::utils::keccak256;
use k256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// SHA-256 digest of a token signing input.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Derives the Ethereum address of a secp256k1 public key.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the
/// uncompressed point, without its `0x04` tag byte. This is the same
/// derivation the registry applies to plain account addresses.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = hash_data(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
