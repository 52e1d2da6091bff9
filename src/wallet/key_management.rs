// src/wallet/key_management.rs
//! Cryptographic key management for an ethr identity.
//!
//! A [`KeyManager`] owns one secp256k1 key and acts as both signing
//! capabilities the crate needs:
//! - [`JwtSigner`]: recoverable signatures over token signing input
//! - [`TransactionSigner`]: EIP-155 signed registry transactions
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 curve (via `k256` crate)
//! - Keccak-256 address derivation and transaction signing (via `ethers`)

use crate::blockchain::transaction::TransactionSigner;
use crate::error::{Error, Result};
use crate::jwt::signature::{JwtSigner, Signature};
use crate::models::did::ethr_did_of;
use crate::utils::crypto::public_key_to_address;
use ethers::signers::{LocalWallet, Signer, Wallet};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};
use ethers::utils::hex;
use k256::ecdsa::{SigningKey, VerifyingKey};

/// Key holder for a single identity.
///
/// # Security Notes
/// - The secret key is never exposed
/// - Signatures are deterministic (RFC 6979) and low-S normalized
#[derive(Clone)]
pub struct KeyManager {
    /// Securely stored private key (never exposed)
    signing_key: SigningKey,
    /// Same key wrapped for transaction signing
    wallet: LocalWallet,
}

impl KeyManager {
    /// Generates a new KeyManager with a fresh random key.
    pub fn new() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::thread_rng()))
    }

    /// Loads a key from its hex encoding (with or without `0x` prefix).
    ///
    /// # Errors
    /// `Signing` if the string is not hex or not a valid secp256k1 scalar.
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| Error::Signing(format!("private key is not hex: {e}")))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::Signing(format!("invalid private key: {e}")))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let wallet = Wallet::from(signing_key.clone());
        KeyManager {
            signing_key,
            wallet,
        }
    }

    /// Sets the chain id used for EIP-155 replay protection.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.wallet = self.wallet.with_chain_id(chain_id);
        self
    }

    pub fn public_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.signing_key)
    }

    pub fn address(&self) -> Address {
        public_key_to_address(self.signing_key.verifying_key())
    }

    /// `did:ethr:` identity of this key.
    pub fn did(&self) -> String {
        ethr_did_of(self.address())
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl JwtSigner for KeyManager {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Signing(e.to_string()))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(Signature {
            r,
            s,
            recovery_id: Some(recovery_id.to_byte()),
        })
    }
}

impl TransactionSigner for KeyManager {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Bytes> {
        let mut tx = tx.clone();
        if tx.chain_id().is_none() {
            tx.set_chain_id(self.wallet.chain_id());
        }
        let signature = self
            .wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(tx.rlp_signed(&signature))
    }
}
