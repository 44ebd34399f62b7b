//! Hash primitive and the canonical pairing rule
//!
//! Every parent digest in the tree is produced by [`combine`], whether the
//! node is written by a full build, an incremental insert, a tombstone repair
//! or rebuilt during proof verification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher as _, Keccak};

use crate::error::Error;

/// Digest width in bytes
pub const DIGEST_SIZE: usize = 32;

/// 32-byte digest produced by a [`HashFunction`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Digest(#[serde(with = "crate::encoding::hex_array")] [u8; DIGEST_SIZE]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = crate::encoding::decode_hex(s).ok()?;
        bytes.try_into().ok().map(Self)
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Digest {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One-way function with a fixed-width output
///
/// Implementations must be collision- and preimage-resistant. The input is
/// given as a list of parts that are hashed as their concatenation, so
/// callers never need to allocate a joined buffer.
pub trait HashFunction: Send + Sync {
    /// Short ASCII name, recorded in snapshots (at most 16 bytes)
    fn name(&self) -> &'static str;

    /// Hash the concatenation of `parts`
    fn hash_parts(&self, parts: &[&[u8]]) -> Digest;

    fn hash(&self, data: &[u8]) -> Digest {
        self.hash_parts(&[data])
    }
}

/// BLAKE3 with 32-byte output
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl HashFunction for Blake3Hasher {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Digest(*hasher.finalize().as_bytes())
    }
}

/// Keccak-256 (Ethereum flavour, not NIST SHA3)
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl HashFunction for Keccak256Hasher {
    fn name(&self) -> &'static str {
        "keccak256"
    }

    fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        let mut keccak = Keccak::v256();
        for part in parts {
            keccak.update(part);
        }
        let mut out = [0u8; DIGEST_SIZE];
        keccak.finalize(&mut out);
        Digest(out)
    }
}

/// Runtime-selected hash primitive
///
/// Used wherever the algorithm comes from configuration or from a published
/// commitment rather than from a type parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Keccak256,
}

impl HashFunction for HashAlgorithm {
    fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => Blake3Hasher.name(),
            HashAlgorithm::Keccak256 => Keccak256Hasher.name(),
        }
    }

    fn hash_parts(&self, parts: &[&[u8]]) -> Digest {
        match self {
            HashAlgorithm::Blake3 => Blake3Hasher.hash_parts(parts),
            HashAlgorithm::Keccak256 => Keccak256Hasher.hash_parts(parts),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "keccak256" | "keccak" => Ok(HashAlgorithm::Keccak256),
            other => Err(Error::UnknownHashAlgorithm(other.to_string())),
        }
    }
}

/// Parent digest of an ordered pair: `H(left || right)`
///
/// Order is positional. Never sort the operands.
pub fn combine<H: HashFunction + ?Sized>(hasher: &H, left: &Digest, right: &Digest) -> Digest {
    hasher.hash_parts(&[&left.0[..], &right.0[..]])
}
