// src/services/mod.rs
//! Signer authorization and the HTTP API.

pub mod api_server;
pub mod resolver;
