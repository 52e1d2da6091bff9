// src/main.rs

//! # ethr DID token server - Main Entry Point
//!
//! Loads configuration, connects to the node, wires the registry client
//! and starts the API server.
//!
//! ## Environment Variables
//! - `ETHR_DID_RPC_URL`: JSON-RPC endpoint of an Ethereum node
//! - `ETHR_DID_REGISTRY_ADDRESS`: deployed ERC-1056 registry
//! - `ETHR_DID_CHAIN_ID`: chain id for transaction signing
//! - `ETHR_DID_PRIVATE_KEY`: (Optional) key for issuing tokens and registry writes
//! - `ETHR_DID_LISTEN_ADDR`: (Optional) bind address, default `127.0.0.1:3000`
//!
//! Log output is controlled with `RUST_LOG`.

use anyhow::Context;
use dotenv::dotenv;
use ethr_did_jwt::blockchain::rpc::http_provider;
use ethr_did_jwt::config::Settings;
use ethr_did_jwt::contracts::did_registry::EthrDidRegistry;
use ethr_did_jwt::services::api_server::ApiServer;
use ethr_did_jwt::wallet::key_management::KeyManager;
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!("starting with {settings:?}");

    let provider = http_provider(&settings.rpc_url)
        .map_err(|e| anyhow::anyhow!("cannot connect to {}: {e}", settings.rpc_url))?;
    let mut registry =
        EthrDidRegistry::new(provider, settings.registry()?)?.with_chain_id(settings.chain_id);

    let key_manager = match &settings.private_key {
        Some(private_key) => {
            let key = KeyManager::from_private_key(private_key)?.with_chain_id(settings.chain_id);
            info!("server identity is {}", key.did());
            registry = registry.with_signer(Arc::new(key.clone()));
            Some(key)
        }
        None => {
            warn!("no private key configured; token issuance and registry writes are disabled");
            None
        }
    };

    let api_server = ApiServer::new(Arc::new(registry), key_manager);
    api_server
        .run(settings.listen()?)
        .await
        .context("API server failed")?;
    Ok(())
}
