//! Query/verify exchange: a record together with its membership proof
//!
//! The record and salt travel with the proof, so the verifier recomputes the
//! leaf itself rather than trusting one supplied by the server.

use serde::{Deserialize, Serialize};

use crate::hash::{Digest, HashAlgorithm, HashFunction};
use crate::leaf::{leaf_digest, Salt};
use crate::proof::{verify_committed, Proof};
use crate::tree::AuthenticatedTree;
use crate::{Commitment, Result};

/// Server answer to a record query
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub index: u64,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub record: Vec<u8>,
    pub salt: Salt,
    pub proof: Proof,
}

impl std::fmt::Debug for QueryResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResponse")
            .field("index", &self.index)
            .field("record_len", &self.record.len())
            .field("salt", &self.salt)
            .field("proof", &self.proof)
            .finish()
    }
}

/// Answer a query; tombstoned indices are refused
pub fn query<H: HashFunction>(tree: &AuthenticatedTree<H>, index: u64) -> Result<QueryResponse> {
    let record = tree.record(index)?.to_vec();
    Ok(QueryResponse {
        index,
        record,
        salt: tree.salt(index)?,
        proof: tree.prove(index)?,
    })
}

/// Client-side check against a trusted root and tree size
#[derive(Debug, Clone)]
pub struct Verifier<H: HashFunction> {
    hasher: H,
    root: Digest,
    leaf_count: u64,
}

impl<H: HashFunction> Verifier<H> {
    pub fn new(hasher: H, root: Digest, leaf_count: u64) -> Self {
        Self {
            hasher,
            root,
            leaf_count,
        }
    }

    pub fn root(&self) -> &Digest {
        &self.root
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// The record at `index` if the trusted root commits to it, otherwise `None`
    ///
    /// A response for any other index is withheld even if it is genuine.
    pub fn verify(&self, index: u64, response: &QueryResponse) -> Option<Vec<u8>> {
        if response.index != index {
            return None;
        }
        let leaf = leaf_digest(&self.hasher, &response.record, &response.salt);
        verify_committed(
            &self.hasher,
            &self.root,
            self.leaf_count,
            &leaf,
            &response.proof,
            index,
        )
        .then(|| response.record.clone())
    }
}

impl Verifier<HashAlgorithm> {
    pub fn from_commitment(commitment: &Commitment) -> Self {
        Self::new(commitment.algorithm, commitment.root, commitment.leaf_count)
    }
}
