//! saltree-core: salted authenticated index with verified retrieval
//!
//! Records are committed to by a binary hash tree whose leaves are
//! `H(record || salt)`. The root is published; any party holding it can
//! check a record against its membership proof without trusting the server.
//!
//! The tree is maintained incrementally: appending a record or tombstoning
//! one rewrites a single leaf-to-root path, and the result is always the
//! same tree a full rebuild would produce.
//!
//! # Retrieval
//!
//! Two exchanges sit on top of the tree:
//! - [`ot`]: sender returns `{leaf, proof, salt}`, the receiver verifies and
//!   only then accepts the record disclosed out of band.
//! - [`pir`]: a query returns `{record, salt, proof}` and the verifier
//!   recomputes the leaf itself.
//!
//! Both fail closed: a record that does not verify is withheld.
//!
//! # Threat Model
//!
//! | Property | Provided |
//! |----------|----------|
//! | Integrity of served records | **YES** - against the published root |
//! | Precomputation across equal records | Defeated by per-record salts |
//! | Hiding the requested index | NO - the sender learns it |
//! | Hiding which slots are tombstoned | NO - adapters refuse them |

mod config;
mod error;
pub mod encoding;
pub mod hash;
pub mod leaf;
pub mod ot;
pub mod pir;
pub mod proof;
pub mod snapshot;
pub mod tree;

pub use config::{parse_seed_records, RetrievalConfig, PROTOCOL_VERSION};
pub use error::Error;
pub use hash::{combine, Blake3Hasher, Digest, HashAlgorithm, HashFunction, Keccak256Hasher, DIGEST_SIZE};
pub use leaf::{leaf_digest, LeafSlot, Salt, SaltSource, MAX_RECORD_LEN, SALT_LEN, TOMBSTONE_SENTINEL};
pub use proof::{proof_len, verify, verify_committed, Proof};
pub use snapshot::SnapshotError;
pub use tree::AuthenticatedTree;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

/// Published commitment to the current tree state
///
/// `epoch` counts completed mutations since the tree was loaded, so clients
/// can tell a fresh root from a replayed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub root: Digest,
    pub leaf_count: u64,
    pub algorithm: HashAlgorithm,
    pub epoch: u64,
}

impl Commitment {
    pub fn of(tree: &AuthenticatedTree<HashAlgorithm>, epoch: u64) -> Self {
        Self {
            root: tree.root(),
            leaf_count: tree.len() as u64,
            algorithm: *tree.hasher(),
            epoch,
        }
    }
}
