//! Hex encoding helpers for serde
//!
//! Digests, salts and records travel as lowercase hex strings in JSON.
//! A leading `0x` is accepted on input.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Decode a hex string, tolerating a `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

/// Fixed-width byte arrays as hex strings
pub mod hex_array {
    use super::*;

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(D::Error::custom)?;
        bytes.try_into().map_err(|v: Vec<u8>| {
            D::Error::custom(format!("expected {} bytes, got {}", N, v.len()))
        })
    }
}

/// Variable-length byte vectors as hex strings
pub mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map_err(D::Error::custom)
    }
}
