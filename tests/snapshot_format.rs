//! Tests for the tree snapshot byte layout
//!
//! Layout: 72-byte header, one slot per leaf, then every level.

use rand::rngs::StdRng;
use rand::SeedableRng;

use saltree_core::snapshot::{
    self, SnapshotHeader, HASHER_NAME_SIZE, SNAPSHOT_HEADER_SIZE, SNAPSHOT_MAGIC,
};
use saltree_core::{
    AuthenticatedTree, Blake3Hasher, Error, HashAlgorithm, Keccak256Hasher, SnapshotError,
    DIGEST_SIZE, SALT_LEN,
};

const SLOT_FIXED: usize = 1 + SALT_LEN + 4;

fn seeded_tree(records: &[&str], seed: u64) -> AuthenticatedTree<Blake3Hasher> {
    AuthenticatedTree::build_with_salts(
        Blake3Hasher,
        records.iter().map(|r| r.as_bytes().to_vec()),
        StdRng::seed_from_u64(seed),
    )
    .unwrap()
}

fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn test_header_constants() {
    assert_eq!(SNAPSHOT_MAGIC, *b"SLT1");
    assert_eq!(SNAPSHOT_HEADER_SIZE, 72);
    assert_eq!(HASHER_NAME_SIZE, 16);
}

#[test]
fn test_header_field_offsets() {
    let tree = seeded_tree(&["a", "b", "c"], 1);
    let bytes = snapshot::encode(&tree);

    assert_eq!(&bytes[0..4], b"SLT1");
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 1);
    assert_eq!(&bytes[6..8], &[0, 0]);
    assert_eq!(u64_at(&bytes, 8), 3);
    assert_eq!(u32_at(&bytes, 16), 3);
    assert_eq!(u32_at(&bytes, 20), SALT_LEN as u32);
    assert_eq!(&bytes[24..30], b"blake3");
    assert!(bytes[30..40].iter().all(|&b| b == 0));
    assert_eq!(&bytes[40..72], tree.root().as_bytes());

    let header = SnapshotHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.hasher_name(), "blake3");
    assert_eq!(header.root, tree.root());
}

#[test]
fn test_slot_layout() {
    let mut tree = seeded_tree(&["hello", "", "xyz"], 2);
    tree.tombstone(2).unwrap();
    let bytes = snapshot::encode(&tree);

    // live slot
    let mut offset = SNAPSHOT_HEADER_SIZE;
    assert_eq!(bytes[offset], 0);
    assert_eq!(&bytes[offset + 1..offset + 1 + SALT_LEN], tree.salt(0).unwrap().as_bytes());
    assert_eq!(u32_at(&bytes, offset + 1 + SALT_LEN), 5);
    assert_eq!(&bytes[offset + SLOT_FIXED..offset + SLOT_FIXED + 5], b"hello");
    offset += SLOT_FIXED + 5;

    // empty record is still live
    assert_eq!(bytes[offset], 0);
    assert_eq!(u32_at(&bytes, offset + 1 + SALT_LEN), 0);
    offset += SLOT_FIXED;

    // tombstone keeps its salt and drops the record
    assert_eq!(bytes[offset], 1);
    assert_eq!(&bytes[offset + 1..offset + 1 + SALT_LEN], tree.salt(2).unwrap().as_bytes());
    assert_eq!(u32_at(&bytes, offset + 1 + SALT_LEN), 0);
    offset += SLOT_FIXED;

    // levels: 3 leaves, 2 nodes, root
    for (expected_len, level) in [3u64, 2, 1].iter().zip(tree.levels()) {
        assert_eq!(u64_at(&bytes, offset), *expected_len);
        offset += 8;
        for digest in level {
            assert_eq!(&bytes[offset..offset + DIGEST_SIZE], digest.as_bytes());
            offset += DIGEST_SIZE;
        }
    }
    assert_eq!(offset, bytes.len());
}

#[test]
fn test_seeded_encoding_is_deterministic() {
    let records = ["r0", "r1", "r2", "r3"];
    assert_eq!(
        snapshot::encode(&seeded_tree(&records, 42)),
        snapshot::encode(&seeded_tree(&records, 42))
    );
    assert_ne!(
        snapshot::encode(&seeded_tree(&records, 42)),
        snapshot::encode(&seeded_tree(&records, 43))
    );
}

#[test]
fn test_decoded_tree_keeps_growing() {
    let records = ["a", "b", "c", "d", "e"];
    let tree = seeded_tree(&records, 3);
    let mut decoded = snapshot::decode(Blake3Hasher, &snapshot::encode(&tree)).unwrap();
    assert_eq!(decoded.root(), tree.root());

    let index = decoded.insert(b"f".to_vec()).unwrap();
    assert_eq!(index, 5);
    let proof = decoded.prove(index).unwrap();
    assert!(saltree_core::verify(
        &Blake3Hasher,
        &decoded.root(),
        &decoded.leaf(index).unwrap(),
        &proof,
        index
    ));

    // still a valid snapshot after the insert
    let again = snapshot::decode(Blake3Hasher, &snapshot::encode(&decoded)).unwrap();
    assert_eq!(again.root(), decoded.root());
}

#[test]
fn test_algorithm_enum_reads_named_hasher() {
    let tree = AuthenticatedTree::build(Keccak256Hasher, vec![b"k".to_vec(), b"v".to_vec()]).unwrap();
    let bytes = snapshot::encode(&tree);

    let decoded = snapshot::decode(HashAlgorithm::Keccak256, &bytes).unwrap();
    assert_eq!(decoded.root(), tree.root());

    assert!(matches!(
        snapshot::decode(HashAlgorithm::Blake3, &bytes),
        Err(Error::Snapshot(SnapshotError::HasherMismatch { .. }))
    ));
}

#[test]
fn test_unsupported_version() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a"], 4));
    bytes[4] = 2;
    assert!(matches!(
        snapshot::decode(Blake3Hasher, &bytes),
        Err(Error::Snapshot(SnapshotError::UnsupportedVersion { actual: 2 }))
    ));
}

#[test]
fn test_salt_length_mismatch() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a"], 5));
    bytes[20..24].copy_from_slice(&32u32.to_le_bytes());
    assert!(matches!(
        snapshot::decode(Blake3Hasher, &bytes),
        Err(Error::Snapshot(SnapshotError::SaltLengthMismatch { expected: 16, actual: 32 }))
    ));
}

#[test]
fn test_zero_leaves_rejected() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a", "b"], 6));
    bytes[8..16].copy_from_slice(&0u64.to_le_bytes());
    assert!(matches!(
        snapshot::decode(Blake3Hasher, &bytes),
        Err(Error::Snapshot(SnapshotError::Empty))
    ));
}

#[test]
fn test_forged_header_root_rejected() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a", "b", "c"], 7));
    bytes[40] ^= 0xff;
    assert!(matches!(
        snapshot::decode(Blake3Hasher, &bytes),
        Err(Error::Snapshot(SnapshotError::RootMismatch))
    ));
}

#[test]
fn test_swapped_salt_rejected() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a", "b"], 8));
    // first byte of slot 0's salt
    bytes[SNAPSHOT_HEADER_SIZE + 1] ^= 0x01;
    assert!(matches!(
        snapshot::decode(Blake3Hasher, &bytes),
        Err(Error::Snapshot(SnapshotError::LevelMismatch { level: 0 }))
    ));
}

#[test]
fn test_tombstone_flag_over_live_record_rejected() {
    let mut bytes = snapshot::encode(&seeded_tree(&["a", "b"], 9));
    // slot 0 keeps its one-byte record but claims to be tombstoned
    assert_eq!(u32_at(&bytes, SNAPSHOT_HEADER_SIZE + 1 + SALT_LEN), 1);
    bytes[SNAPSHOT_HEADER_SIZE] = 1;

    let err = snapshot::decode(Blake3Hasher, &bytes).unwrap_err();
    assert!(matches!(
        err,
        Error::Snapshot(SnapshotError::TombstoneWithRecord { index: 0, len: 1 })
    ));
    assert!(err.to_string().contains("Tombstoned slot 0 carries 1 record bytes"));
}
