//! Tree snapshot file format
//!
//! All integers are little-endian.
//!
//! ```text
//! header (72 bytes)
//!   0..4    magic "SLT1"
//!   4..6    version (u16)
//!   6..8    reserved
//!   8..16   leaf count (u64)
//!   16..20  level count (u32)
//!   20..24  salt length (u32)
//!   24..40  hasher name, ASCII, zero padded
//!   40..72  root digest
//! slots (leaf count times)
//!   flag (u8: 0 live, 1 tombstoned) | salt | record length (u32) | record
//! levels (level count times, leaves first)
//!   length (u64) | digests
//! ```
//!
//! Levels are written in order and byte-exact. Decoding rebuilds the levels
//! from the slots and rejects the file unless they match the stored ones.

use std::path::Path;

use rand::rngs::OsRng;

use crate::hash::{Digest, HashFunction, DIGEST_SIZE};
use crate::leaf::{LeafSlot, Salt, SALT_LEN};
use crate::tree::AuthenticatedTree;

/// Magic bytes identifying a saltree snapshot
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SLT1";

/// Header size in bytes
pub const SNAPSHOT_HEADER_SIZE: usize = 72;

/// Width of the hasher name field
pub const HASHER_NAME_SIZE: usize = 16;

const SLOT_LIVE: u8 = 0;
const SLOT_TOMBSTONED: u8 = 1;

/// Snapshot header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes: "SLT1"
    pub magic: [u8; 4],
    /// Format version (currently 1)
    pub version: u16,
    /// Number of leaves, tombstoned included
    pub leaf_count: u64,
    /// Number of levels, leaves and root included
    pub level_count: u32,
    /// Salt length in bytes
    pub salt_len: u32,
    /// Hasher name, zero padded
    pub hasher_name: [u8; HASHER_NAME_SIZE],
    /// Root at the time of writing
    pub root: Digest,
}

impl SnapshotHeader {
    /// Current format version
    pub const VERSION: u16 = 1;

    pub fn new(leaf_count: u64, level_count: u32, hasher_name: &str, root: Digest) -> Self {
        let mut name = [0u8; HASHER_NAME_SIZE];
        let len = hasher_name.len().min(HASHER_NAME_SIZE);
        name[..len].copy_from_slice(&hasher_name.as_bytes()[..len]);

        Self {
            magic: SNAPSHOT_MAGIC,
            version: Self::VERSION,
            leaf_count,
            level_count,
            salt_len: SALT_LEN as u32,
            hasher_name: name,
            root,
        }
    }

    /// Hasher name with the zero padding stripped
    pub fn hasher_name(&self) -> String {
        let end = self
            .hasher_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(HASHER_NAME_SIZE);
        String::from_utf8_lossy(&self.hasher_name[..end]).into_owned()
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; SNAPSHOT_HEADER_SIZE] {
        let mut buf = [0u8; SNAPSHOT_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.leaf_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.level_count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.salt_len.to_le_bytes());
        buf[24..40].copy_from_slice(&self.hasher_name);
        buf[40..72].copy_from_slice(self.root.as_bytes());
        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < SNAPSHOT_HEADER_SIZE {
            return Err(SnapshotError::HeaderTooShort { actual: data.len() });
        }

        let mut reader = Reader::new(&data[..SNAPSHOT_HEADER_SIZE]);
        let magic: [u8; 4] = reader.array("header")?;
        if magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic { actual: magic });
        }

        let version = reader.u16("header")?;
        let _reserved: [u8; 2] = reader.array("header")?;
        let leaf_count = reader.u64("header")?;
        let level_count = reader.u32("header")?;
        let salt_len = reader.u32("header")?;
        let hasher_name: [u8; HASHER_NAME_SIZE] = reader.array("header")?;
        let root = Digest::new(reader.array("header")?);

        Ok(Self {
            magic,
            version,
            leaf_count,
            level_count,
            salt_len,
            hasher_name,
            root,
        })
    }

    /// Check if data starts with the snapshot magic
    pub fn has_magic(data: &[u8]) -> bool {
        data.len() >= 4 && data[0..4] == SNAPSHOT_MAGIC
    }
}

/// Errors for snapshot parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Header is too short
    HeaderTooShort { actual: usize },
    /// Invalid magic bytes
    InvalidMagic { actual: [u8; 4] },
    /// Unknown format version
    UnsupportedVersion { actual: u16 },
    /// Salt width differs from this build
    SaltLengthMismatch { expected: u32, actual: u32 },
    /// Written with a different hash primitive
    HasherMismatch { expected: String, actual: String },
    /// Snapshot holds no leaves
    Empty,
    /// Data ends inside a section
    Truncated { section: &'static str, offset: usize },
    /// Slot flag is neither live nor tombstoned
    InvalidSlotFlag { index: u64, flag: u8 },
    /// Tombstoned slot still carries record bytes
    TombstoneWithRecord { index: u64, len: u32 },
    /// Bytes left over after the last level
    TrailingBytes { count: usize },
    /// Stored level disagrees with the level rebuilt from the slots
    LevelMismatch { level: usize },
    /// Stored root disagrees with the rebuilt root
    RootMismatch,
}

impl core::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SnapshotError::HeaderTooShort { actual } => {
                write!(f, "Header too short: need {} bytes, got {}", SNAPSHOT_HEADER_SIZE, actual)
            }
            SnapshotError::InvalidMagic { actual } => {
                write!(f, "Invalid magic: expected {:?}, got {:?}", SNAPSHOT_MAGIC, actual)
            }
            SnapshotError::UnsupportedVersion { actual } => {
                write!(f, "Unsupported version: expected {}, got {}", SnapshotHeader::VERSION, actual)
            }
            SnapshotError::SaltLengthMismatch { expected, actual } => {
                write!(f, "Salt length mismatch: expected {}, got {}", expected, actual)
            }
            SnapshotError::HasherMismatch { expected, actual } => {
                write!(f, "Hasher mismatch: expected {}, snapshot uses {}", expected, actual)
            }
            SnapshotError::Empty => write!(f, "Snapshot holds no leaves"),
            SnapshotError::Truncated { section, offset } => {
                write!(f, "Truncated {} section at byte {}", section, offset)
            }
            SnapshotError::InvalidSlotFlag { index, flag } => {
                write!(f, "Invalid flag {} for slot {}", flag, index)
            }
            SnapshotError::TombstoneWithRecord { index, len } => {
                write!(f, "Tombstoned slot {} carries {} record bytes", index, len)
            }
            SnapshotError::TrailingBytes { count } => {
                write!(f, "{} trailing bytes after last level", count)
            }
            SnapshotError::LevelMismatch { level } => {
                write!(f, "Level {} does not match the rebuilt tree", level)
            }
            SnapshotError::RootMismatch => write!(f, "Root does not match the rebuilt tree"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Serialize a tree, levels included
pub fn encode<H: HashFunction>(tree: &AuthenticatedTree<H>) -> Vec<u8> {
    let header = SnapshotHeader::new(
        tree.len() as u64,
        tree.height() as u32,
        tree.hasher().name(),
        tree.root(),
    );

    let record_bytes: usize = tree
        .slots()
        .iter()
        .map(|slot| 1 + SALT_LEN + 4 + slot.record().map_or(0, <[u8]>::len))
        .sum();
    let level_bytes: usize = tree
        .levels()
        .iter()
        .map(|level| 8 + level.len() * DIGEST_SIZE)
        .sum();

    let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_SIZE + record_bytes + level_bytes);
    buf.extend_from_slice(&header.to_bytes());

    for slot in tree.slots() {
        let (flag, record) = match slot.record() {
            Some(record) => (SLOT_LIVE, record),
            None => (SLOT_TOMBSTONED, &[][..]),
        };
        buf.push(flag);
        buf.extend_from_slice(slot.salt().as_bytes());
        buf.extend_from_slice(&(record.len() as u32).to_le_bytes());
        buf.extend_from_slice(record);
    }

    for level in tree.levels() {
        buf.extend_from_slice(&(level.len() as u64).to_le_bytes());
        for digest in level {
            buf.extend_from_slice(digest.as_bytes());
        }
    }

    buf
}

/// Parse and validate a snapshot; future inserts salt from the OS RNG
pub fn decode<H: HashFunction>(hasher: H, data: &[u8]) -> crate::Result<AuthenticatedTree<H>> {
    let header = SnapshotHeader::from_bytes(data)?;
    if header.version != SnapshotHeader::VERSION {
        return Err(SnapshotError::UnsupportedVersion { actual: header.version }.into());
    }
    if header.salt_len != SALT_LEN as u32 {
        return Err(SnapshotError::SaltLengthMismatch {
            expected: SALT_LEN as u32,
            actual: header.salt_len,
        }
        .into());
    }
    if header.hasher_name() != hasher.name() {
        return Err(SnapshotError::HasherMismatch {
            expected: hasher.name().to_string(),
            actual: header.hasher_name(),
        }
        .into());
    }
    if header.leaf_count == 0 {
        return Err(SnapshotError::Empty.into());
    }

    let mut reader = Reader::new(data);
    reader.skip(SNAPSHOT_HEADER_SIZE);

    // a corrupt count must not drive a huge allocation
    let min_slot = 1 + SALT_LEN + 4;
    let mut slots = Vec::with_capacity((header.leaf_count as usize).min(reader.remaining() / min_slot));
    for index in 0..header.leaf_count {
        let flag = reader.u8("slots")?;
        let salt = Salt::new(reader.array("slots")?);
        let len = reader.u32("slots")?;
        let record = reader.take(len as usize, "slots")?;
        let slot = match flag {
            SLOT_LIVE => LeafSlot::live(record.to_vec(), salt),
            SLOT_TOMBSTONED if len != 0 => {
                return Err(SnapshotError::TombstoneWithRecord { index, len }.into())
            }
            SLOT_TOMBSTONED => LeafSlot::tombstoned(salt),
            flag => return Err(SnapshotError::InvalidSlotFlag { index, flag }.into()),
        };
        slots.push(slot);
    }

    let mut stored = Vec::with_capacity((header.level_count as usize).min(64));
    for _ in 0..header.level_count {
        let len = reader.u64("levels")? as usize;
        let mut level = Vec::with_capacity(len.min(reader.remaining() / DIGEST_SIZE));
        for _ in 0..len {
            level.push(Digest::new(reader.array("levels")?));
        }
        stored.push(level);
    }
    if reader.remaining() != 0 {
        return Err(SnapshotError::TrailingBytes { count: reader.remaining() }.into());
    }

    let tree = AuthenticatedTree::from_slots(hasher, slots, Box::new(OsRng))?;

    let rebuilt = tree.levels();
    for level in 0..rebuilt.len().max(stored.len()) {
        if rebuilt.get(level) != stored.get(level) {
            return Err(SnapshotError::LevelMismatch { level }.into());
        }
    }
    if tree.root() != header.root {
        return Err(SnapshotError::RootMismatch.into());
    }

    Ok(tree)
}

/// Write a snapshot file
pub fn save<H: HashFunction>(tree: &AuthenticatedTree<H>, path: impl AsRef<Path>) -> crate::Result<()> {
    std::fs::write(path.as_ref(), encode(tree))?;
    Ok(())
}

/// Read and validate a snapshot file
pub fn load<H: HashFunction>(hasher: H, path: impl AsRef<Path>) -> crate::Result<AuthenticatedTree<H>> {
    let data = std::fs::read(path.as_ref())?;
    decode(hasher, &data)
}

/// Bounds-checked little-endian cursor
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn skip(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.data.len());
    }

    fn take(&mut self, n: usize, section: &'static str) -> Result<&'a [u8], SnapshotError> {
        if n > self.remaining() {
            return Err(SnapshotError::Truncated {
                section,
                offset: self.offset,
            });
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], SnapshotError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, section)?);
        Ok(out)
    }

    fn u8(&mut self, section: &'static str) -> Result<u8, SnapshotError> {
        Ok(self.array::<1>(section)?[0])
    }

    fn u16(&mut self, section: &'static str) -> Result<u16, SnapshotError> {
        Ok(u16::from_le_bytes(self.array(section)?))
    }

    fn u32(&mut self, section: &'static str) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.array(section)?))
    }

    fn u64(&mut self, section: &'static str) -> Result<u64, SnapshotError> {
        Ok(u64::from_le_bytes(self.array(section)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Blake3Hasher, Keccak256Hasher};
    use crate::Error;

    fn sample_tree() -> AuthenticatedTree<Blake3Hasher> {
        let mut tree =
            AuthenticatedTree::build(Blake3Hasher, vec![b"a".to_vec(), b"bb".to_vec(), vec![]])
                .unwrap();
        tree.insert(b"dddd".to_vec()).unwrap();
        tree.tombstone(1).unwrap();
        tree
    }

    #[test]
    fn test_header_roundtrip() {
        let root = Digest::new([0xab; 32]);
        let header = SnapshotHeader::new(1000, 11, "blake3", root);

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), SNAPSHOT_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"SLT1");

        let recovered = SnapshotHeader::from_bytes(&bytes).unwrap();
        assert_eq!(recovered, header);
        assert_eq!(recovered.hasher_name(), "blake3");
        assert_eq!(recovered.salt_len, SALT_LEN as u32);
    }

    #[test]
    fn test_has_magic() {
        assert!(SnapshotHeader::has_magic(b"SLT1...."));
        assert!(!SnapshotHeader::has_magic(b"XXXX...."));
        assert!(!SnapshotHeader::has_magic(b"SLT"));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = [0u8; SNAPSHOT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(b"XXXX");
        let result = SnapshotHeader::from_bytes(&bytes);
        assert!(matches!(result, Err(SnapshotError::InvalidMagic { .. })));
    }

    #[test]
    fn test_tree_roundtrip_preserves_levels_and_tombstones() {
        let tree = sample_tree();
        let decoded = decode(Blake3Hasher, &encode(&tree)).unwrap();

        assert_eq!(decoded.root(), tree.root());
        assert_eq!(decoded.levels(), tree.levels());
        assert_eq!(decoded.slots(), tree.slots());
        assert!(decoded.is_tombstoned(1).unwrap());
        assert_eq!(decoded.record(2).unwrap(), b"");
    }

    #[test]
    fn test_hasher_mismatch() {
        let data = encode(&sample_tree());
        let result = decode(Keccak256Hasher, &data);
        assert!(matches!(
            result,
            Err(Error::Snapshot(SnapshotError::HasherMismatch { .. }))
        ));
    }

    #[test]
    fn test_corrupted_digest_rejected() {
        let mut data = encode(&sample_tree());
        let last = data.len() - 1;
        data[last] ^= 0xff;
        assert!(matches!(
            decode(Blake3Hasher, &data),
            Err(Error::Snapshot(SnapshotError::LevelMismatch { .. }))
        ));
    }

    #[test]
    fn test_corrupted_record_rejected() {
        let mut data = encode(&sample_tree());
        // first slot: flag, salt, len, then record "a"
        data[SNAPSHOT_HEADER_SIZE + 1 + SALT_LEN + 4] ^= 0x01;
        assert!(matches!(
            decode(Blake3Hasher, &data),
            Err(Error::Snapshot(SnapshotError::LevelMismatch { level: 0 }))
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let data = encode(&sample_tree());
        assert!(matches!(
            decode(Blake3Hasher, &data[..data.len() - 5]),
            Err(Error::Snapshot(SnapshotError::Truncated { section: "levels", .. }))
        ));

        let mut longer = data.clone();
        longer.push(0);
        assert!(matches!(
            decode(Blake3Hasher, &longer),
            Err(Error::Snapshot(SnapshotError::TrailingBytes { count: 1 }))
        ));
    }

    #[test]
    fn test_bad_slot_flag() {
        let mut data = encode(&sample_tree());
        data[SNAPSHOT_HEADER_SIZE] = 7;
        assert!(matches!(
            decode(Blake3Hasher, &data),
            Err(Error::Snapshot(SnapshotError::InvalidSlotFlag { index: 0, flag: 7 }))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.snapshot");
        let tree = sample_tree();
        save(&tree, &path).unwrap();

        let mut loaded = load(Blake3Hasher, &path).unwrap();
        assert_eq!(loaded.root(), tree.root());
        let index = loaded.insert(b"after-load".to_vec()).unwrap();
        assert_eq!(index, 4);
    }
}
