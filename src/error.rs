// src/error.rs
//! Error taxonomy shared by the token codecs, the registry client and the
//! resolver.
//!
//! Every failure carries enough context (phase, lengths, identity, signer)
//! to be logged by the caller without re-deriving state. Nothing in the
//! crate retries; retry policy belongs to the caller.

use ethers::types::Address;
use std::fmt;
use thiserror::Error;

/// Boxed cause for failures coming out of the JSON-RPC transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Which half of a registry operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `eth_call` against the registry (owner / delegate lookups)
    Read,
    /// nonce + gas price reads, signing and broadcast of a transaction
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Read => f.write_str("read"),
            Phase::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bad token framing, base64url or JSON.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature bytes do not have the size required by the algorithm.
    #[error("malformed {alg} signature: expected {expected} bytes, got {actual}")]
    MalformedSignature {
        alg: String,
        expected: usize,
        actual: usize,
    },

    /// Public key recovery failed or was ambiguous.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The recovered signer is neither owner nor valid delegate of the identity.
    #[error("signer {signer:?} is not authorized for {identity}")]
    UnauthorizedSigner { identity: String, signer: Address },

    /// The `exp` claim has elapsed.
    #[error("token expired at {expired_at} (now {now})")]
    ExpiredToken { expired_at: i64, now: i64 },

    /// Any JSON-RPC failure talking to the registry.
    #[error("registry {phase} call failed: {cause}")]
    RegistryCall {
        phase: Phase,
        #[source]
        cause: BoxError,
    },

    /// The local signing capability failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The identity does not resolve to an ethr address.
    #[error("not an ethr identity: {0}")]
    InvalidIdentity(String),

    /// An argument does not fit the registry's fixed-width encoding.
    #[error("{what} is {len} bytes, the registry accepts at most 32")]
    InvalidArgument { what: String, len: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wraps an RPC failure with the phase it happened in.
    pub fn registry<E>(phase: Phase, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::RegistryCall {
            phase,
            cause: cause.into(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
