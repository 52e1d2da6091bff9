// src/services/resolver.rs
//! Signer authorization for identities.
//!
//! Token verification recovers a signer address from the signature; this
//! module decides whether that address may speak for the identity named in
//! the token. The registry is the authority: the current owner is always
//! authorized, and delegates are consulted through an optional
//! [`DelegateLookup`] seam.

use crate::blockchain::rpc::JsonRpc;
use crate::contracts::did_registry::EthrDidRegistry;
use crate::error::Result;
use crate::models::delegate::DelegateType;
use crate::models::did::normalize_did;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::Address;
use log::debug;
use std::sync::Arc;

/// Answers "may `candidate` sign for `identity` at time `at`?".
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn is_authorized_signer(
        &self,
        identity: &str,
        candidate: Address,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Extension point for delegate-based authorization.
///
/// Consulted only after the owner check failed. Implementations decide
/// which delegate types count as signers.
#[async_trait]
pub trait DelegateLookup: Send + Sync {
    async fn is_valid_delegate(
        &self,
        identity: &str,
        candidate: Address,
        at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Resolver backed by the on-chain registry.
///
/// Reads are never cached: every check performs a fresh owner lookup.
pub struct RegistryResolver<R> {
    registry: Arc<EthrDidRegistry<R>>,
    delegates: Option<Arc<dyn DelegateLookup>>,
}

impl<R: JsonRpc> RegistryResolver<R> {
    /// Owner-only resolver.
    pub fn new(registry: Arc<EthrDidRegistry<R>>) -> Self {
        RegistryResolver {
            registry,
            delegates: None,
        }
    }

    /// Also accepts signers that `delegates` reports as valid.
    pub fn with_delegates(mut self, delegates: Arc<dyn DelegateLookup>) -> Self {
        self.delegates = Some(delegates);
        self
    }
}

#[async_trait]
impl<R: JsonRpc> IdentityResolver for RegistryResolver<R> {
    async fn is_authorized_signer(
        &self,
        identity: &str,
        candidate: Address,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let did = normalize_did(identity);
        let owner = self.registry.lookup_owner(&did).await?;
        if owner == candidate {
            return Ok(true);
        }

        match &self.delegates {
            Some(delegates) => {
                let valid = delegates.is_valid_delegate(&did, candidate, at).await?;
                debug!("{candidate:?} is not the owner of {did}; delegate check: {valid}");
                Ok(valid)
            }
            None => {
                debug!("{candidate:?} is not the owner of {did} ({owner:?})");
                Ok(false)
            }
        }
    }
}

/// Delegate check against the registry's `validDelegate` for one delegate
/// type. The contract judges expiry by block time, so `at` is not used.
pub struct RegistryDelegates<R> {
    registry: Arc<EthrDidRegistry<R>>,
    delegate_type: DelegateType,
}

impl<R: JsonRpc> RegistryDelegates<R> {
    pub fn new(registry: Arc<EthrDidRegistry<R>>, delegate_type: DelegateType) -> Self {
        RegistryDelegates {
            registry,
            delegate_type,
        }
    }
}

#[async_trait]
impl<R: JsonRpc> DelegateLookup for RegistryDelegates<R> {
    async fn is_valid_delegate(
        &self,
        identity: &str,
        candidate: Address,
        _at: DateTime<Utc>,
    ) -> Result<bool> {
        self.registry
            .valid_delegate(identity, &self.delegate_type, candidate)
            .await
    }
}
