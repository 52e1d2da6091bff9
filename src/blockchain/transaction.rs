// src/blockchain/transaction.rs
//! Registry transaction construction and the signing seam.

use crate::error::Result;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};

/// Gas limit of every registry write. Fixed, never estimated.
pub const REGISTRY_GAS_LIMIT: u64 = 70_000;

/// Capability that signs transactions on behalf of an identity owner.
///
/// Signing is a local computation: no I/O, no suspension.
pub trait TransactionSigner: Send + Sync {
    /// Account whose key this signer holds.
    fn address(&self) -> Address;

    /// Signs `tx` and returns the raw RLP encoding ready for broadcast.
    fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Bytes>;
}

/// Builds a legacy transaction calling the registry.
///
/// `value` is always zero and the gas limit is [`REGISTRY_GAS_LIMIT`].
pub fn registry_transaction(
    from: Address,
    registry: Address,
    nonce: U256,
    gas_price: U256,
    data: Bytes,
    chain_id: Option<u64>,
) -> TypedTransaction {
    let mut request = TransactionRequest::new()
        .from(from)
        .to(registry)
        .nonce(nonce)
        .gas_price(gas_price)
        .gas(REGISTRY_GAS_LIMIT)
        .data(data)
        .value(0u64);
    if let Some(chain_id) = chain_id {
        request = request.chain_id(chain_id);
    }
    request.into()
}
