// src/models/mod.rs
//! Data structures: identities, token framing and delegate options.

pub mod delegate;
pub mod did;
pub mod token;
