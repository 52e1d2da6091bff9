// src/config.rs
//! Runtime configuration.
//!
//! Settings come from `ETHR_DID_*` environment variables (a `.env` file is
//! loaded first by `main`), falling back to the defaults below.
//!
//! | Variable                   | Default                                      |
//! |----------------------------|----------------------------------------------|
//! | `ETHR_DID_RPC_URL`          | `http://localhost:8545`                      |
//! | `ETHR_DID_REGISTRY_ADDRESS` | `0xdca7ef03e98e0dc2b855be647c39abe984fcf21b` |
//! | `ETHR_DID_CHAIN_ID`         | `1`                                          |
//! | `ETHR_DID_PRIVATE_KEY`      | unset (read-only server)                     |
//! | `ETHR_DID_LISTEN_ADDR`      | `127.0.0.1:3000`                             |

use crate::contracts::did_registry::DEFAULT_REGISTRY_ADDRESS;
use crate::error::{Error, Result};
use config::{Config, Environment};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

const ENV_PREFIX: &str = "ETHR_DID";

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub rpc_url: String,
    pub registry_address: String,
    pub chain_id: u64,
    /// Hex key used to issue tokens and sign registry transactions.
    pub private_key: Option<String>,
    pub listen_addr: String,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::build(Environment::with_prefix(ENV_PREFIX))
    }

    /// Reads settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::build(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn build(environment: Environment) -> Result<Self> {
        let settings: Settings = Config::builder()
            .set_default("rpc_url", "http://localhost:8545")?
            .set_default("registry_address", DEFAULT_REGISTRY_ADDRESS)?
            .set_default("chain_id", 1)?
            .set_default("listen_addr", "127.0.0.1:3000")?
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.registry()?;
        settings.listen()?;
        Ok(settings)
    }

    /// Parsed registry contract address.
    pub fn registry(&self) -> Result<Address> {
        self.registry_address
            .parse()
            .map_err(|e| Error::Config(format!("registry_address {}: {e}", self.registry_address)))
    }

    /// Parsed listen address.
    pub fn listen(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| Error::Config(format!("listen_addr {}: {e}", self.listen_addr)))
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("registry_address", &self.registry_address)
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("listen_addr", &self.listen_addr)
            .finish()
    }
}
