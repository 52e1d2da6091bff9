// src/utils/mod.rs
//! Helper functions shared across the codecs and the registry client.

pub mod crypto;
pub mod serialization;
