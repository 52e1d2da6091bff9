// src/blockchain/rpc.rs
//! JSON-RPC access to an Ethereum node.
//!
//! The registry client only needs four node methods (`eth_call`,
//! `eth_getTransactionCount`, `eth_gasPrice`, `eth_sendRawTransaction`).
//! They are expressed as the [`JsonRpc`] trait so the transport can be
//! swapped, and implemented here for any `ethers` [`Provider`].
//!
//! Timeouts and connection handling belong to the transport; failures are
//! returned boxed and wrapped by the caller with the phase they occurred in.

use crate::error::BoxError;
use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};

/// Node capability consumed by the registry client.
#[async_trait]
pub trait JsonRpc: Send + Sync {
    /// `eth_call` against `to` with ABI-encoded `data`, at the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BoxError>;

    /// `eth_getTransactionCount` of `address` (the next nonce).
    async fn get_transaction_count(&self, address: Address) -> Result<U256, BoxError>;

    /// `eth_gasPrice`
    async fn get_gas_price(&self) -> Result<U256, BoxError>;

    /// `eth_sendRawTransaction`; returns the transaction hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, BoxError>;
}

#[async_trait]
impl<P> JsonRpc for Provider<P>
where
    P: JsonRpcClient + 'static,
{
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BoxError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Ok(Middleware::call(self, &tx, None).await?)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<U256, BoxError> {
        Ok(Middleware::get_transaction_count(self, address, None).await?)
    }

    async fn get_gas_price(&self) -> Result<U256, BoxError> {
        Ok(Middleware::get_gas_price(self).await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, BoxError> {
        let pending = Middleware::send_raw_transaction(self, raw).await?;
        Ok(pending.tx_hash())
    }
}

/// Connects an HTTP JSON-RPC provider.
///
/// # Arguments
/// * `rpc_url` - node endpoint, e.g. `http://localhost:8545`
///
/// # Errors
/// Returns error if the URL cannot be parsed. No request is made here.
pub fn http_provider(rpc_url: &str) -> Result<Provider<Http>, BoxError> {
    Ok(Provider::<Http>::try_from(rpc_url)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};
    use std::str::FromStr;

    fn rpc_response(result: &str) -> String {
        format!(r#"{{"jsonrpc":"2.0","id":1,"result":{result}}}"#)
    }

    #[tokio::test]
    async fn http_provider_reads_gas_price_and_nonce() {
        let _gas = mock("POST", "/")
            .match_body(Matcher::Regex("eth_gasPrice".into()))
            .with_header("content-type", "application/json")
            .with_body(rpc_response(r#""0x3b9aca00""#))
            .create();
        let _nonce = mock("POST", "/")
            .match_body(Matcher::Regex("eth_getTransactionCount".into()))
            .with_header("content-type", "application/json")
            .with_body(rpc_response(r#""0x7""#))
            .create();

        let provider = http_provider(&mockito::server_url()).unwrap();
        let address = Address::from_str("0x7e5f4552091a69125d5dfcb7b8c2659029395bdf").unwrap();

        assert_eq!(
            JsonRpc::get_gas_price(&provider).await.unwrap(),
            U256::from(1_000_000_000u64)
        );
        assert_eq!(
            JsonRpc::get_transaction_count(&provider, address).await.unwrap(),
            U256::from(7)
        );
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(http_provider("not a url").is_err());
    }
}
