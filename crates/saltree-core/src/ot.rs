//! Sender/receiver exchange for a single secret
//!
//! The sender answers an index with the leaf, its proof and its salt. The
//! receiver checks the proof against the published root and only then
//! accepts the record, which arrives separately, if it hashes to that leaf
//! under that salt. The sender learns which index was requested.

use serde::{Deserialize, Serialize};

use crate::hash::{Digest, HashAlgorithm, HashFunction};
use crate::leaf::{leaf_digest, Salt};
use crate::proof::{verify_committed, Proof};
use crate::tree::AuthenticatedTree;
use crate::{Commitment, Result};

/// Sender's answer for one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderResponse {
    pub index: u64,
    pub leaf: Digest,
    pub proof: Proof,
    pub salt: Salt,
}

/// Record released after the receiver accepted a [`SenderResponse`]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDisclosure {
    pub index: u64,
    #[serde(with = "crate::encoding::hex_bytes")]
    pub record: Vec<u8>,
}

impl std::fmt::Debug for RecordDisclosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDisclosure")
            .field("index", &self.index)
            .field("record_len", &self.record.len())
            .finish()
    }
}

/// Build the sender's answer; tombstoned indices are refused
pub fn sender_response<H: HashFunction>(
    tree: &AuthenticatedTree<H>,
    index: u64,
) -> Result<SenderResponse> {
    // fails with RecordUnavailable before anything is disclosed
    tree.record(index)?;

    Ok(SenderResponse {
        index,
        leaf: tree.leaf(index)?,
        proof: tree.prove(index)?,
        salt: tree.salt(index)?,
    })
}

/// Release the record out of band
pub fn record_disclosure<H: HashFunction>(
    tree: &AuthenticatedTree<H>,
    index: u64,
) -> Result<RecordDisclosure> {
    Ok(RecordDisclosure {
        index,
        record: tree.record(index)?.to_vec(),
    })
}

/// Receiver holding a trusted root and tree size
#[derive(Debug, Clone)]
pub struct Receiver<H: HashFunction> {
    hasher: H,
    root: Digest,
    leaf_count: u64,
}

impl<H: HashFunction> Receiver<H> {
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

    /// Proof check only: the trusted root commits to `response.leaf` at `index`
    pub fn verify_response(&self, index: u64, response: &SenderResponse) -> bool {
        response.index == index
            && verify_committed(
                &self.hasher,
                &self.root,
                self.leaf_count,
                &response.leaf,
                &response.proof,
                index,
            )
    }

    /// Accept `record` as the record at `index`, or withhold it
    ///
    /// Returns the record only when it hashes to the committed leaf under the
    /// response's salt and that leaf verifies at `index` against the trusted root.
    pub fn accept(&self, index: u64, response: &SenderResponse, record: &[u8]) -> Option<Vec<u8>> {
        if leaf_digest(&self.hasher, record, &response.salt) != response.leaf {
            return None;
        }
        if !self.verify_response(index, response) {
            return None;
        }
        Some(record.to_vec())
    }
}

impl Receiver<HashAlgorithm> {
    pub fn from_commitment(commitment: &Commitment) -> Self {
        Self::new(commitment.algorithm, commitment.root, commitment.leaf_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Blake3Hasher;
    use crate::Error;

    fn tree() -> AuthenticatedTree<Blake3Hasher> {
        let records: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 32]).collect();
        AuthenticatedTree::build(Blake3Hasher, records).unwrap()
    }

    #[test]
    fn test_exchange_accepts_honest_sender() {
        let tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);

        let response = sender_response(&tree, 3).unwrap();
        assert!(receiver.verify_response(3, &response));

        let disclosure = record_disclosure(&tree, 3).unwrap();
        assert_eq!(
            receiver.accept(3, &response, &disclosure.record),
            Some(vec![3u8; 32])
        );
    }

    #[test]
    fn test_wrong_record_withheld() {
        let tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);
        let response = sender_response(&tree, 3).unwrap();
        assert_eq!(receiver.accept(3, &response, &[4u8; 32]), None);
    }

    #[test]
    fn test_stale_root_withheld() {
        let mut tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);
        tree.insert(vec![9u8; 32]).unwrap();

        let response = sender_response(&tree, 3).unwrap();
        assert!(!receiver.verify_response(3, &response));
        assert_eq!(receiver.accept(3, &response, &[3u8; 32]), None);
    }

    #[test]
    fn test_forged_leaf_withheld() {
        let tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);
        let mut response = sender_response(&tree, 3).unwrap();
        // consistent leaf for a record the tree never committed to
        response.leaf = leaf_digest(&Blake3Hasher, b"forged", &response.salt);
        assert_eq!(receiver.accept(3, &response, b"forged"), None);
    }

    #[test]
    fn test_tombstoned_index_refused() {
        let mut tree = tree();
        tree.tombstone(5).unwrap();

        assert!(matches!(
            sender_response(&tree, 5),
            Err(Error::RecordUnavailable { index: 5 })
        ));
        assert!(matches!(
            record_disclosure(&tree, 5),
            Err(Error::RecordUnavailable { index: 5 })
        ));
        // neighbours still served against the new root
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);
        assert!(receiver.verify_response(4, &sender_response(&tree, 4).unwrap()));
    }

    #[test]
    fn test_response_for_other_index_withheld() {
        let tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);
        let response = sender_response(&tree, 2).unwrap();
        let record = record_disclosure(&tree, 2).unwrap().record;
        assert_eq!(receiver.accept(2, &response, &record), Some(vec![2u8; 32]));
        assert!(!receiver.verify_response(3, &response));
        assert_eq!(receiver.accept(3, &response, &record), None);
    }

    #[test]
    fn test_shortened_proof_withheld() {
        let tree = tree();
        let receiver = Receiver::new(Blake3Hasher, tree.root(), tree.len() as u64);

        // leaf claimed at index 1 is really the parent of leaves 2 and 3
        let (l2, l3) = (tree.leaf(2).unwrap(), tree.leaf(3).unwrap());
        let mut record = l2.as_bytes().to_vec();
        record.extend_from_slice(&l3.as_bytes()[..16]);
        let mut salt = [0u8; 16];
        salt.copy_from_slice(&l3.as_bytes()[16..]);
        let salt = Salt::new(salt);
        let response = SenderResponse {
            index: 1,
            leaf: leaf_digest(&Blake3Hasher, &record, &salt),
            proof: Proof::new(tree.prove(2).unwrap().siblings()[1..].to_vec()),
            salt,
        };
        assert_eq!(response.leaf, tree.levels()[1][1]);

        assert!(!receiver.verify_response(1, &response));
        assert_eq!(receiver.accept(1, &response, &record), None);
    }

    #[test]
    fn test_from_commitment() {
        let records: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 4]).collect();
        let tree = AuthenticatedTree::build(HashAlgorithm::Keccak256, records).unwrap();
        let receiver = Receiver::from_commitment(&Commitment::of(&tree, 3));
        assert_eq!(receiver.leaf_count(), 5);
        assert_eq!(receiver.root(), &tree.root());

        let response = sender_response(&tree, 4).unwrap();
        assert_eq!(receiver.accept(4, &response, &[4u8; 4]), Some(vec![4u8; 4]));
        // index 5 would reuse leaf 4's path through the duplicated tail
        assert_eq!(receiver.accept(5, &SenderResponse { index: 5, ..response }, &[4u8; 4]), None);
    }

    #[test]
    fn test_response_json_shape() {
        let tree = tree();
        let response = sender_response(&tree, 0).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["leaf"], response.leaf.to_hex());
        assert_eq!(json["proof"].as_array().unwrap().len(), 3);

        let parsed: SenderResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, response);
    }
}
