//! Identifier helpers: joined store keys, asset ids, consensus addresses.

use sha2::{Digest, Sha256};

/// Asset id of the chain's native token.
///
/// The native token is not tracked in the per-asset staker tables; its
/// delegations live in the exo-asset delegation aggregate instead.
pub const EXOCORE_ASSET_ID: &str = "0xdeaddeaddeaddeaddeaddeaddeaddeaddeaddead_0x0";

/// Length in bytes of a consensus address.
const CONS_ADDR_LEN: usize = 20;

/// Length in bytes of an ed25519 consensus public key.
const ED25519_PUBKEY_LEN: usize = 32;

/// Errors raised while decoding identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// A joined key did not split into the expected number of parts.
    #[error("key {key:?} does not have {expected} '/'-separated parts")]
    JoinedKey {
        /// The raw key.
        key: String,
        /// Number of parts expected.
        expected: usize,
    },

    /// A consensus public key is not valid hex of the right length.
    #[error("invalid consensus public key {0:?}")]
    ConsensusKey(String),
}

/// Split a `/`-joined store key into exactly `n` non-empty parts.
pub fn split_joined_key(key: &str, n: usize) -> Result<Vec<String>, KeyError> {
    let parts: Vec<String> = key.split('/').map(str::to_owned).collect();
    if parts.len() != n || parts.iter().any(String::is_empty) {
        return Err(KeyError::JoinedKey {
            key: key.to_owned(),
            expected: n,
        });
    }
    Ok(parts)
}

/// Split a `/`-joined key into a pair.
pub fn split_pair(key: &str) -> Result<(String, String), KeyError> {
    let mut parts = split_joined_key(key, 2)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(KeyError::JoinedKey {
            key: key.to_owned(),
            expected: 2,
        }),
    }
}

/// Split a `staker/asset/operator` delegation key.
pub fn split_triple(key: &str) -> Result<(String, String, String), KeyError> {
    let mut parts = split_joined_key(key, 3)?.into_iter();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(KeyError::JoinedKey {
            key: key.to_owned(),
            expected: 3,
        }),
    }
}

/// Build the asset id for a token: lower-cased address, `_0x`, hex `LayerZero` id.
pub fn asset_id(address: &str, layer_zero_chain_id: u64) -> String {
    format!("{}_0x{layer_zero_chain_id:x}", address.to_lowercase())
}

/// Derive the hex consensus address of an ed25519 public key.
///
/// The address is the first 20 bytes of `sha256(pubkey)`, lower-case hex
/// without a prefix. A `0x` prefix on the input is accepted.
pub fn consensus_address(pubkey_hex: &str) -> Result<String, KeyError> {
    let raw = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    let bytes = hex::decode(raw).map_err(|_err| KeyError::ConsensusKey(pubkey_hex.to_owned()))?;
    if bytes.len() != ED25519_PUBKEY_LEN {
        return Err(KeyError::ConsensusKey(pubkey_hex.to_owned()));
    }
    let digest = Sha256::digest(&bytes);
    let addr = digest
        .get(..CONS_ADDR_LEN)
        .ok_or_else(|| KeyError::ConsensusKey(pubkey_hex.to_owned()))?;
    Ok(hex::encode(addr))
}

/// Normalise a consensus public key to `0x`-prefixed lower-case hex.
pub fn normalize_pubkey_hex(pubkey_hex: &str) -> String {
    let raw = pubkey_hex.strip_prefix("0x").unwrap_or(pubkey_hex);
    format!("0x{}", raw.to_lowercase())
}

/// Record key of an undelegation: big-endian height then sequence id, hex.
pub fn undelegation_record_id(block_number: u64, undelegation_id: u64) -> String {
    let mut bytes = Vec::with_capacity(16);
    bytes.extend_from_slice(&block_number.to_be_bytes());
    bytes.extend_from_slice(&undelegation_id.to_be_bytes());
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn joined_keys() {
        assert_eq!(
            split_pair("op1/0xabc_0x65").unwrap(),
            (String::from("op1"), String::from("0xabc_0x65"))
        );
        assert!(split_pair("only").is_err());
        assert!(split_pair("a//b").is_err());
        let (s, a, o) = split_triple("s1/0xabc/op1").unwrap();
        assert_eq!((s.as_str(), a.as_str(), o.as_str()), ("s1", "0xabc", "op1"));
    }

    #[test]
    fn asset_ids_are_lowercase_hex() {
        assert_eq!(asset_id("0xABCdef", 101), "0xabcdef_0x65");
    }

    #[test]
    fn consensus_address_is_twenty_bytes() {
        let key = format!("0x{}", "11".repeat(32));
        let addr = consensus_address(&key).unwrap();
        assert_eq!(addr.len(), 40);
        assert_eq!(addr, consensus_address(&"11".repeat(32)).unwrap());
        assert!(consensus_address("0x1234").is_err());
        assert!(consensus_address("zz").is_err());
    }

    #[test]
    fn record_ids_are_big_endian() {
        assert_eq!(
            undelegation_record_id(1, 2),
            "0x00000000000000010000000000000002"
        );
    }
}
