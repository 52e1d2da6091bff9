// src/blockchain/mock.rs
//! In-memory node double that emulates the registry contract's view
//! methods and records every write.

use crate::blockchain::rpc::JsonRpc;
use crate::blockchain::transaction::TransactionSigner;
use crate::error::{BoxError, Result};
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{id, keccak256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) struct MockRpc {
    owners: Mutex<HashMap<Address, Address>>,
    delegates: Mutex<HashSet<(Address, [u8; 32], Address)>>,
    pub calls: AtomicUsize,
    pub sent: Mutex<Vec<Bytes>>,
    pub nonce: U256,
    pub gas_price: U256,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MockRpc {
    pub fn new() -> Self {
        MockRpc {
            owners: Mutex::new(HashMap::new()),
            delegates: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            nonce: U256::from(5),
            gas_price: U256::from(1_000_000_000u64),
            fail_reads: false,
            fail_writes: false,
        }
    }

    pub fn with_owner(self, identity: Address, owner: Address) -> Self {
        self.owners.lock().unwrap().insert(identity, owner);
        self
    }

    pub fn with_delegate(self, identity: Address, delegate_type: [u8; 32], delegate: Address) -> Self {
        self.delegates
            .lock()
            .unwrap()
            .insert((identity, delegate_type, delegate));
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    fn word(bytes: &[u8]) -> Bytes {
        let mut word = vec![0u8; 32];
        word[32 - bytes.len()..].copy_from_slice(bytes);
        Bytes::from(word)
    }
}

#[async_trait]
impl JsonRpc for MockRpc {
    async fn call(&self, _to: Address, data: Bytes) -> std::result::Result<Bytes, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err("connection refused".into());
        }

        let (selector, args) = data.as_ref().split_at(4);
        if selector == id("identityOwner(address)") {
            let tokens = abi::decode(&[ParamType::Address], args)?;
            let identity = tokens[0].clone().into_address().ok_or("bad identity")?;
            // the contract answers with the identity itself when there is no override
            let owner = self
                .owners
                .lock()
                .unwrap()
                .get(&identity)
                .copied()
                .unwrap_or(identity);
            Ok(Self::word(owner.as_bytes()))
        } else if selector == id("validDelegate(address,bytes32,address)") {
            let tokens = abi::decode(
                &[ParamType::Address, ParamType::FixedBytes(32), ParamType::Address],
                args,
            )?;
            let mut delegate_type = [0u8; 32];
            if let Token::FixedBytes(bytes) = &tokens[1] {
                delegate_type.copy_from_slice(bytes);
            }
            let key = (
                tokens[0].clone().into_address().ok_or("bad identity")?,
                delegate_type,
                tokens[2].clone().into_address().ok_or("bad delegate")?,
            );
            let valid = self.delegates.lock().unwrap().contains(&key);
            Ok(Self::word(&[valid as u8]))
        } else {
            Err("execution reverted".into())
        }
    }

    async fn get_transaction_count(&self, _address: Address) -> std::result::Result<U256, BoxError> {
        if self.fail_writes {
            return Err("nonce unavailable".into());
        }
        Ok(self.nonce)
    }

    async fn get_gas_price(&self) -> std::result::Result<U256, BoxError> {
        Ok(self.gas_price)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> std::result::Result<H256, BoxError> {
        if self.fail_writes {
            return Err("replacement transaction underpriced".into());
        }
        let hash = H256::from(keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }
}

/// Signer double that records what it was asked to sign and returns the
/// unsigned RLP encoding.
pub(crate) struct RecordingSigner {
    pub address: Address,
    pub signed: Mutex<Vec<TypedTransaction>>,
}

impl RecordingSigner {
    pub fn new(address: Address) -> Self {
        RecordingSigner {
            address,
            signed: Mutex::new(Vec::new()),
        }
    }
}

impl TransactionSigner for RecordingSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Bytes> {
        self.signed.lock().unwrap().push(tx.clone());
        Ok(tx.rlp())
    }
}
