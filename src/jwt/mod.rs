// src/jwt/mod.rs
//! Signature-recovery tokens: the signature codec and the token codec.

pub mod signature;
pub mod token;
