// src/wallet/mod.rs
//! Local key custody and signing.

pub mod key_management;
