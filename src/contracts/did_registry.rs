// src/contracts/did_registry.rs
//! Ethereum DID Registry (ERC-1056) client.
//!
//! Reads and mutates the ownership, delegate and attribute records the
//! registry keeps per identity. Every mutation is a two-phase protocol:
//! 1. **read**: `identityOwner` via `eth_call` to learn who may sign
//! 2. **write**: nonce and gas price reads, a locally signed transaction
//!    from the owner to the registry, then `eth_sendRawTransaction`
//!
//! Nothing is cached between calls: each write looks the owner and the
//! nonce up afresh. No retries are attempted; failures surface as
//! [`Error::RegistryCall`] tagged with the phase.

use crate::blockchain::rpc::JsonRpc;
use crate::blockchain::transaction::{registry_transaction, TransactionSigner};
use crate::error::{Error, Phase, Result};
use crate::models::delegate::{to_bytes32, DelegateOptions, DelegateType};
use crate::models::did::ethr_address;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, H256, U256};
use log::{debug, info, warn};
use std::sync::Arc;

/// Mainnet deployment of the registry.
pub const DEFAULT_REGISTRY_ADDRESS: &str = "0xdca7ef03e98e0dc2b855be647c39abe984fcf21b";

/// Registry contract client.
///
/// # Type Parameters
/// * `R` - JSON-RPC transport
pub struct EthrDidRegistry<R> {
    rpc: R,
    /// Address of the deployed registry contract
    address: Address,
    abi: Abi,
    /// Owner key used for writes; reads work without one
    signer: Option<Arc<dyn TransactionSigner>>,
    chain_id: Option<u64>,
}

impl<R> EthrDidRegistry<R>
where
    R: JsonRpc,
{
    /// Creates a read-only registry client.
    ///
    /// # Arguments
    /// * `rpc` - node transport
    /// * `address` - address of the deployed registry contract
    ///
    /// # Errors
    /// `Config` if the bundled contract ABI cannot be loaded.
    pub fn new(rpc: R, address: Address) -> Result<Self> {
        let abi = Abi::load(&include_bytes!("../abi/EthereumDIDRegistry.json")[..])
            .map_err(|e| Error::Config(format!("failed to load registry ABI: {e}")))?;
        Ok(EthrDidRegistry {
            rpc,
            address,
            abi,
            signer: None,
            chain_id: None,
        })
    }

    /// Attaches the signing capability used for writes.
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Chain id stamped on outgoing transactions (EIP-155).
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the current owner of `identity`.
    ///
    /// The owner is the last 20 bytes of the `identityOwner` result. The
    /// contract answers with the identity itself when ownership was never
    /// changed; a zero address is read the same way.
    ///
    /// # Errors
    /// - `InvalidIdentity` if `identity` does not name an ethr address
    /// - `RegistryCall` (read) if the call fails or returns too few bytes
    pub async fn lookup_owner(&self, identity: &str) -> Result<Address> {
        let identity_address = identity_address(identity)?;
        let data = self.encode(
            "identityOwner",
            &[Token::Address(identity_address)],
            Phase::Read,
        )?;

        let raw = self
            .rpc
            .call(self.address, data)
            .await
            .map_err(|e| Error::registry(Phase::Read, e))?;
        if raw.len() < 20 {
            return Err(Error::registry(
                Phase::Read,
                format!("identityOwner returned {} bytes", raw.len()),
            ));
        }

        let owner = Address::from_slice(&raw[raw.len() - 20..]);
        let owner = if owner.is_zero() {
            identity_address
        } else {
            owner
        };
        debug!("owner of {identity} is {owner:?}");
        Ok(owner)
    }

    /// Asks the registry whether `delegate` is a currently valid delegate
    /// of `delegate_type` for `identity`. Expiry is judged by the contract
    /// against the latest block time.
    pub async fn valid_delegate(
        &self,
        identity: &str,
        delegate_type: &DelegateType,
        delegate: Address,
    ) -> Result<bool> {
        let identity_address = identity_address(identity)?;
        let data = self.encode(
            "validDelegate",
            &[
                Token::Address(identity_address),
                Token::FixedBytes(delegate_type.to_bytes32()?.to_vec()),
                Token::Address(delegate),
            ],
            Phase::Read,
        )?;

        let raw = self
            .rpc
            .call(self.address, data)
            .await
            .map_err(|e| Error::registry(Phase::Read, e))?;
        let valid = raw.last().map(|b| *b != 0).unwrap_or(false);
        debug!("{delegate:?} valid {delegate_type} delegate of {identity}: {valid}");
        Ok(valid)
    }

    /// Transfers ownership of `identity` to `new_owner`.
    ///
    /// # Returns
    /// Hash of the broadcast transaction
    pub async fn change_owner(&self, identity: &str, new_owner: Address) -> Result<H256> {
        let owner = self.lookup_owner(identity).await?;
        let data = self.encode(
            "changeOwner",
            &[
                Token::Address(identity_address(identity)?),
                Token::Address(new_owner),
            ],
            Phase::Write,
        )?;
        self.sign_and_send_contract_call(owner, data).await
    }

    /// Adds `delegate` for `identity`, valid for `options.expires_in` seconds.
    ///
    /// # Returns
    /// Hash of the broadcast transaction
    pub async fn add_delegate(
        &self,
        identity: &str,
        delegate: Address,
        options: &DelegateOptions,
    ) -> Result<H256> {
        let delegate_type = options.delegate_type.to_bytes32()?;
        let owner = self.lookup_owner(identity).await?;
        let data = self.encode(
            "addDelegate",
            &[
                Token::Address(identity_address(identity)?),
                Token::FixedBytes(delegate_type.to_vec()),
                Token::Address(delegate),
                Token::Uint(U256::from(options.expires_in)),
            ],
            Phase::Write,
        )?;
        self.sign_and_send_contract_call(owner, data).await
    }

    /// Revokes `delegate` of type `delegate_type` for `identity`.
    ///
    /// # Returns
    /// Hash of the broadcast transaction
    pub async fn revoke_delegate(
        &self,
        identity: &str,
        delegate: Address,
        delegate_type: &DelegateType,
    ) -> Result<H256> {
        let delegate_type = delegate_type.to_bytes32()?;
        let owner = self.lookup_owner(identity).await?;
        let data = self.encode(
            "revokeDelegate",
            &[
                Token::Address(identity_address(identity)?),
                Token::FixedBytes(delegate_type.to_vec()),
                Token::Address(delegate),
            ],
            Phase::Write,
        )?;
        self.sign_and_send_contract_call(owner, data).await
    }

    /// Sets attribute `key` to `value` for `expires_in` seconds.
    ///
    /// `key` is stored as a right-padded `bytes32`, `value` as raw UTF-8 bytes.
    ///
    /// # Returns
    /// Hash of the broadcast transaction
    ///
    /// # Errors
    /// `InvalidArgument` if `key` is longer than 32 bytes; nothing is sent.
    pub async fn set_attribute(
        &self,
        identity: &str,
        key: &str,
        value: &str,
        expires_in: u64,
    ) -> Result<H256> {
        let key = to_bytes32("attribute key", key.as_bytes())?;
        let owner = self.lookup_owner(identity).await?;
        let data = self.encode(
            "setAttribute",
            &[
                Token::Address(identity_address(identity)?),
                Token::FixedBytes(key.to_vec()),
                Token::Bytes(value.as_bytes().to_vec()),
                Token::Uint(U256::from(expires_in)),
            ],
            Phase::Write,
        )?;
        self.sign_and_send_contract_call(owner, data).await
    }

    /// Shared write phase: nonce and gas price (fetched concurrently),
    /// local signing, broadcast.
    async fn sign_and_send_contract_call(&self, owner: Address, data: Bytes) -> Result<H256> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| Error::Signing("no transaction signer configured".into()))?;
        if signer.address() != owner {
            warn!(
                "signer {:?} is not the current owner {owner:?}; the registry will reject this write",
                signer.address()
            );
        }

        let (nonce, gas_price) = futures::try_join!(
            self.rpc.get_transaction_count(owner),
            self.rpc.get_gas_price()
        )
        .map_err(|e| Error::registry(Phase::Write, e))?;

        let tx = registry_transaction(owner, self.address, nonce, gas_price, data, self.chain_id);
        let raw = signer.sign_transaction(&tx)?;

        let tx_hash = self
            .rpc
            .send_raw_transaction(raw)
            .await
            .map_err(|e| Error::registry(Phase::Write, e))?;
        info!("registry transaction {tx_hash:?} sent from {owner:?} with nonce {nonce}");
        Ok(tx_hash)
    }

    fn encode(&self, method: &str, tokens: &[Token], phase: Phase) -> Result<Bytes> {
        let function = self
            .abi
            .function(method)
            .map_err(|e| Error::registry(phase, e))?;
        let data = function
            .encode_input(tokens)
            .map_err(|e| Error::registry(phase, e))?;
        Ok(Bytes::from(data))
    }
}

fn identity_address(identity: &str) -> Result<Address> {
    ethr_address(identity).ok_or_else(|| Error::InvalidIdentity(identity.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::mock::{MockRpc, RecordingSigner};
    use crate::blockchain::transaction::REGISTRY_GAS_LIMIT;
    use ethers::abi::{decode, ParamType};
    use ethers::utils::id;
    use std::str::FromStr;

    const IDENTITY: &str = "0xf3beac30c498d9e26865f34fcaa57dbb935b0d74";

    fn identity() -> Address {
        Address::from_str(IDENTITY).unwrap()
    }

    fn registry_address() -> Address {
        Address::from_str(DEFAULT_REGISTRY_ADDRESS).unwrap()
    }

    fn registry(rpc: MockRpc, signer: Arc<RecordingSigner>) -> EthrDidRegistry<MockRpc> {
        EthrDidRegistry::new(rpc, registry_address())
            .unwrap()
            .with_signer(signer)
            .with_chain_id(1)
    }

    fn only_signed(signer: &RecordingSigner) -> ethers::types::transaction::eip2718::TypedTransaction {
        let signed = signer.signed.lock().unwrap();
        assert_eq!(signed.len(), 1);
        signed[0].clone()
    }

    #[tokio::test]
    async fn owner_defaults_to_identity() {
        let registry = EthrDidRegistry::new(MockRpc::new(), registry_address()).unwrap();
        let owner = registry.lookup_owner(IDENTITY).await.unwrap();
        assert_eq!(owner, identity());

        let did = format!("did:ethr:{IDENTITY}");
        assert_eq!(registry.lookup_owner(&did).await.unwrap(), identity());
    }

    #[tokio::test]
    async fn owner_reflects_registry_override() {
        let new_owner = Address::repeat_byte(0xab);
        let rpc = MockRpc::new().with_owner(identity(), new_owner);
        let registry = EthrDidRegistry::new(rpc, registry_address()).unwrap();
        assert_eq!(registry.lookup_owner(IDENTITY).await.unwrap(), new_owner);
    }

    #[tokio::test]
    async fn lookup_rejects_non_ethr_identity() {
        let registry = EthrDidRegistry::new(MockRpc::new(), registry_address()).unwrap();
        let err = registry
            .lookup_owner("did:uport:2nQtiQG6Cgm1GYTBaaKAgr76uY7iSexUkqX")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentity(_)));
    }

    #[tokio::test]
    async fn read_failure_is_tagged_with_read_phase() {
        let registry =
            EthrDidRegistry::new(MockRpc::new().failing_reads(), registry_address()).unwrap();
        match registry.lookup_owner(IDENTITY).await {
            Err(Error::RegistryCall { phase, .. }) => assert_eq!(phase, Phase::Read),
            other => panic!("expected read failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn change_owner_sends_signed_call_from_owner() {
        let signer = Arc::new(RecordingSigner::new(identity()));
        let registry = registry(MockRpc::new(), signer.clone());
        let new_owner = Address::repeat_byte(0x42);

        let tx_hash = registry.change_owner(IDENTITY, new_owner).await.unwrap();
        assert_ne!(tx_hash, H256::zero());

        let tx = only_signed(&signer);
        assert_eq!(tx.from(), Some(&identity()));
        assert_eq!(tx.to_addr(), Some(&registry_address()));
        assert_eq!(tx.nonce(), Some(&U256::from(5)));
        assert_eq!(tx.gas_price(), Some(U256::from(1_000_000_000u64)));
        assert_eq!(tx.gas(), Some(&U256::from(REGISTRY_GAS_LIMIT)));
        assert_eq!(tx.value(), Some(&U256::zero()));

        let data = tx.data().unwrap();
        assert_eq!(&data[..4], &id("changeOwner(address,address)")[..]);
        let args = decode(&[ParamType::Address, ParamType::Address], &data[4..]).unwrap();
        assert_eq!(args, vec![Token::Address(identity()), Token::Address(new_owner)]);
    }

    #[tokio::test]
    async fn writes_are_sent_from_current_owner() {
        let owner = Address::repeat_byte(0x77);
        let signer = Arc::new(RecordingSigner::new(owner));
        let registry = registry(MockRpc::new().with_owner(identity(), owner), signer.clone());

        registry
            .set_attribute(IDENTITY, "did/svc/HubService", "https://hubs.uport.me", 3600)
            .await
            .unwrap();

        let tx = only_signed(&signer);
        assert_eq!(tx.from(), Some(&owner));
        let data = tx.data().unwrap();
        assert_eq!(&data[..4], &id("setAttribute(address,bytes32,bytes,uint256)")[..]);
        let args = decode(
            &[
                ParamType::Address,
                ParamType::FixedBytes(32),
                ParamType::Bytes,
                ParamType::Uint(256),
            ],
            &data[4..],
        )
        .unwrap();
        assert_eq!(args[0], Token::Address(identity()));
        assert_eq!(args[1], Token::FixedBytes(to_bytes32("key", b"did/svc/HubService").unwrap().to_vec()));
        assert_eq!(args[2], Token::Bytes(b"https://hubs.uport.me".to_vec()));
        assert_eq!(args[3], Token::Uint(U256::from(3600)));
    }

    #[tokio::test]
    async fn add_and_revoke_delegate_encode_delegate_type() {
        let signer = Arc::new(RecordingSigner::new(identity()));
        let registry = registry(MockRpc::new(), signer.clone());
        let delegate = Address::repeat_byte(0x0d);

        registry
            .add_delegate(IDENTITY, delegate, &DelegateOptions::default())
            .await
            .unwrap();
        registry
            .revoke_delegate(IDENTITY, delegate, &DelegateType::default())
            .await
            .unwrap();

        let signed = signer.signed.lock().unwrap();
        assert_eq!(signed.len(), 2);

        let add = signed[0].data().unwrap();
        assert_eq!(&add[..4], &id("addDelegate(address,bytes32,address,uint256)")[..]);
        let args = decode(
            &[
                ParamType::Address,
                ParamType::FixedBytes(32),
                ParamType::Address,
                ParamType::Uint(256),
            ],
            &add[4..],
        )
        .unwrap();
        assert_eq!(
            args[1],
            Token::FixedBytes(DelegateType::default().to_bytes32().unwrap().to_vec())
        );
        assert_eq!(args[2], Token::Address(delegate));
        assert_eq!(args[3], Token::Uint(U256::from(86_400)));

        let revoke = signed[1].data().unwrap();
        assert_eq!(&revoke[..4], &id("revokeDelegate(address,bytes32,address)")[..]);
    }

    #[tokio::test]
    async fn each_write_looks_up_owner_again() {
        let signer = Arc::new(RecordingSigner::new(identity()));
        let registry = registry(MockRpc::new(), signer);

        registry.change_owner(IDENTITY, identity()).await.unwrap();
        registry.change_owner(IDENTITY, identity()).await.unwrap();

        assert_eq!(registry.rpc.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(registry.rpc.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn write_failure_is_tagged_with_write_phase() {
        let signer = Arc::new(RecordingSigner::new(identity()));
        let registry = registry(MockRpc::new().failing_writes(), signer.clone());

        match registry.change_owner(IDENTITY, Address::zero()).await {
            Err(Error::RegistryCall { phase, .. }) => assert_eq!(phase, Phase::Write),
            other => panic!("expected write failure, got {other:?}"),
        }
        assert!(signer.signed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_keys_and_tags_are_rejected_before_any_call() {
        let signer = Arc::new(RecordingSigner::new(identity()));
        let registry = registry(MockRpc::new(), signer.clone());
        let did = format!("did:ethr:{IDENTITY}");

        for key in [
            "did/pub/Secp256k1/veriKey/hex/primary",
            "did/pub/Secp256k1/veriKey/hex/private",
        ] {
            match registry.set_attribute(&did, key, "v", 10).await {
                Err(Error::InvalidArgument { what, len }) => {
                    assert_eq!(what, "attribute key");
                    assert_eq!(len, 37);
                }
                other => panic!("expected InvalidArgument, got {other:?}"),
            }
        }

        let long_type = DelegateType::from("Secp256k1VerificationKey2018WithExtras");
        let options = DelegateOptions {
            delegate_type: long_type.clone(),
            ..DelegateOptions::default()
        };
        let delegate = Address::repeat_byte(0x0d);
        assert!(matches!(
            registry.add_delegate(IDENTITY, delegate, &options).await,
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.revoke_delegate(IDENTITY, delegate, &long_type).await,
            Err(Error::InvalidArgument { .. })
        ));

        assert_eq!(registry.rpc.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(signer.signed.lock().unwrap().is_empty());
        assert!(registry.rpc.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_need_a_signer() {
        let registry = EthrDidRegistry::new(MockRpc::new(), registry_address()).unwrap();
        let err = registry.change_owner(IDENTITY, Address::zero()).await.unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[tokio::test]
    async fn valid_delegate_reads_registry() {
        let delegate = Address::repeat_byte(0x0d);
        let rpc = MockRpc::new().with_delegate(
            identity(),
            DelegateType::default().to_bytes32().unwrap(),
            delegate,
        );
        let registry = EthrDidRegistry::new(rpc, registry_address()).unwrap();

        assert!(registry
            .valid_delegate(IDENTITY, &DelegateType::default(), delegate)
            .await
            .unwrap());
        assert!(!registry
            .valid_delegate(
                IDENTITY,
                &DelegateType::curve25519_encryption_public_key(),
                delegate
            )
            .await
            .unwrap());
    }

    #[test]
    fn lookup_owner_over_http() {
        let _m = mockito::mock("POST", "/")
            .match_body(mockito::Matcher::Regex(
                "eth_call.*f3beac30c498d9e26865f34fcaa57dbb935b0d74".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"result":"0x000000000000000000000000f3beac30c498d9e26865f34fcaa57dbb935b0d74"}"#,
            )
            .create();

        let provider = crate::blockchain::rpc::http_provider(&mockito::server_url()).unwrap();
        let registry = EthrDidRegistry::new(provider, registry_address()).unwrap();
        let owner = tokio_test::block_on(registry.lookup_owner(IDENTITY)).unwrap();
        assert_eq!(owner, identity());
    }
}
