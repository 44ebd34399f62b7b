//! Leaf derivation: `leaf = H(record || salt)`

use std::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::hash::{Digest, HashFunction};
use crate::Result;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Value hashed in place of a record once its slot is tombstoned
pub const TOMBSTONE_SENTINEL: &[u8] = b"deleted";

/// Largest record a slot accepts; snapshots store record lengths as `u32`
pub const MAX_RECORD_LEN: usize = u32::MAX as usize;

pub fn check_record_len(len: usize) -> Result<()> {
    if len > MAX_RECORD_LEN {
        return Err(Error::RecordTooLarge {
            len,
            max: MAX_RECORD_LEN,
        });
    }
    Ok(())
}

/// Per-record random salt
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Salt(#[serde(with = "crate::encoding::hex_array")] [u8; SALT_LEN]);

impl Salt {
    pub const fn new(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl From<[u8; SALT_LEN]> for Salt {
    fn from(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(self.0))
    }
}

/// Source of fresh salts
///
/// Any cryptographically secure RNG qualifies. Trees default to `OsRng`;
/// tests inject a seeded `StdRng` for reproducible salts.
pub trait SaltSource: Send + Sync {
    fn next_salt(&mut self) -> Salt;
}

impl<R> SaltSource for R
where
    R: RngCore + CryptoRng + Send + Sync,
{
    fn next_salt(&mut self) -> Salt {
        let mut salt = [0u8; SALT_LEN];
        self.fill_bytes(&mut salt);
        Salt(salt)
    }
}

/// Leaf digest of a record under its salt
pub fn leaf_digest<H: HashFunction + ?Sized>(hasher: &H, record: &[u8], salt: &Salt) -> Digest {
    hasher.hash_parts(&[record, &salt.0[..]])
}

/// Leaf digest of a tombstoned slot, reusing the slot's salt
pub fn tombstone_digest<H: HashFunction + ?Sized>(hasher: &H, salt: &Salt) -> Digest {
    leaf_digest(hasher, TOMBSTONE_SENTINEL, salt)
}

/// One occupied index: the record (until tombstoned) and its salt
#[derive(Clone, PartialEq, Eq)]
pub struct LeafSlot {
    record: Option<Vec<u8>>,
    salt: Salt,
}

impl LeafSlot {
    pub fn live(record: Vec<u8>, salt: Salt) -> Self {
        Self {
            record: Some(record),
            salt,
        }
    }

    pub fn tombstoned(salt: Salt) -> Self {
        Self { record: None, salt }
    }

    /// The record, or `None` once tombstoned
    pub fn record(&self) -> Option<&[u8]> {
        self.record.as_deref()
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn is_tombstoned(&self) -> bool {
        self.record.is_none()
    }

    pub(crate) fn tombstone(&mut self) {
        self.record = None;
    }

    /// Current leaf digest (sentinel-based once tombstoned)
    pub fn digest<H: HashFunction + ?Sized>(&self, hasher: &H) -> Digest {
        match &self.record {
            Some(record) => leaf_digest(hasher, record, &self.salt),
            None => tombstone_digest(hasher, &self.salt),
        }
    }
}

// Records are secrets; keep them out of logs.
impl fmt::Debug for LeafSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafSlot")
            .field("record_len", &self.record.as_ref().map(Vec::len))
            .field("salt", &self.salt)
            .finish()
    }
}
