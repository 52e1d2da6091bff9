// src/lib.rs
//! # ethr DID tokens
//!
//! Signature-recovery tokens anchored in the ERC-1056 identity registry.
//!
//! ## Layers
//! 1. **Models**: identifier normalization, token header/payload, delegate types
//! 2. **JWT**: `ES256K` / `ES256K-R` signature codec and the token codec
//! 3. **Blockchain / Contracts**: JSON-RPC capability and the registry client
//! 4. **Services**: signer authorization and the HTTP API
//! 5. **Wallet**: a local secp256k1 key that can sign tokens and transactions

pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod jwt;
pub mod models;
pub mod services;
pub mod utils;
pub mod wallet;

pub use contracts::did_registry::EthrDidRegistry;
pub use error::{Error, Result};
pub use jwt::token::{build, create_token, parse, verify, verify_at, Token};
pub use models::did::normalize_did;
pub use models::token::{Algorithm, Payload};
pub use services::resolver::{IdentityResolver, RegistryResolver};
pub use wallet::key_management::KeyManager;
