// src/contracts/mod.rs
//! On-chain registry bindings.

pub mod did_registry;
