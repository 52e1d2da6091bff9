// src/blockchain/mod.rs
//! Ethereum node access and transaction plumbing.

pub mod rpc;
pub mod transaction;

#[cfg(test)]
pub(crate) mod mock;
