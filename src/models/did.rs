// src/models/did.rs
//! Decentralized Identifier (DID) helpers.
//!
//! Identities arrive in several textual shapes: full DIDs, raw Ethereum
//! addresses (with or without `0x`, any letter casing) and legacy uPort
//! network-qualified identifiers (MNIDs, base58). [`normalize_did`] maps
//! all of them onto one canonical DID string, which is the anchor used for
//! token verification.
//!
//! # DID Format
//! ```text
//! did:<method>:<method-specific-id>
//! did:ethr:0xf3beac30c498d9e26865f34fcaa57dbb935b0d74
//! ```

use ethers::types::Address;

/// Method prefix of Ethereum-address identities.
pub const ETHR_DID_PREFIX: &str = "did:ethr:";

/// Method prefix of legacy uPort identities.
pub const UPORT_DID_PREFIX: &str = "did:uport:";

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Decoded byte length of an MNID: version, network id (1-6 bytes),
/// 20-byte address and a 4-byte checksum.
const MNID_DECODED_LEN: std::ops::RangeInclusive<usize> = 26..=31;

const MNID_VERSION: u8 = 0x01;

/// Canonicalizes a free-form identity string into DID syntax.
///
/// Rules, first match wins:
/// 1. already `did:<method>:...` → unchanged
/// 2. 40 hex characters, optionally `0x`/`0X` prefixed → `did:ethr:0x<hex>`
///    with the digit casing preserved
/// 3. legacy base58 MNID → `did:uport:<mnid>`
/// 4. anything else → unchanged
///
/// This function never fails.
pub fn normalize_did(input: &str) -> String {
    if is_did(input) {
        return input.to_string();
    }
    if let Some(hex) = bare_address_hex(input) {
        return format!("{ETHR_DID_PREFIX}0x{hex}");
    }
    if is_mnid(input) {
        return format!("{UPORT_DID_PREFIX}{input}");
    }
    input.to_string()
}

/// `^did:\w+:.+`
fn is_did(input: &str) -> bool {
    let Some(rest) = input.strip_prefix("did:") else {
        return false;
    };
    let Some((method, specific)) = rest.split_once(':') else {
        return false;
    };
    !method.is_empty()
        && method.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !specific.is_empty()
}

/// Returns the 40 hex digits of an address, prefix stripped, casing untouched.
fn bare_address_hex(input: &str) -> Option<&str> {
    let hex = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    (hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())).then_some(hex)
}

fn is_mnid(input: &str) -> bool {
    if input.is_empty()
        || input.chars().all(|c| c.is_ascii_hexdigit())
        || !input.chars().all(|c| BASE58_ALPHABET.contains(c))
    {
        return false;
    }
    match bs58::decode(input).into_vec() {
        Ok(bytes) => MNID_DECODED_LEN.contains(&bytes.len()) && bytes[0] == MNID_VERSION,
        Err(_) => false,
    }
}

/// Extracts the Ethereum address referenced by an identity.
///
/// The identity is normalized first, so raw addresses work too. Accepts
/// `did:ethr:0x…`, network-qualified `did:ethr:<network>:0x…`, and ignores
/// any `#fragment`, `?query` or `/path` suffix. Returns `None` for
/// identities of other methods.
pub fn ethr_address(identity: &str) -> Option<Address> {
    let did = normalize_did(identity);
    let specific = did.strip_prefix(ETHR_DID_PREFIX)?;
    let end = specific.find(&['#', '?', '/'][..]).unwrap_or(specific.len());
    let specific = &specific[..end];
    let candidate = specific.rsplit(':').next()?;
    let hex = bare_address_hex(candidate)?;
    hex.parse::<Address>().ok()
}

/// Canonical `did:ethr:` identity of an address (lowercase hex).
pub fn ethr_did_of(address: Address) -> String {
    format!("{ETHR_DID_PREFIX}0x{address:x}")
}
