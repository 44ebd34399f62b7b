//! Membership proofs and stateless verification

use serde::{Deserialize, Serialize};

use crate::hash::{combine, Digest, HashFunction};

/// Sibling digests from the leaf level up to the level just below the root
///
/// Where a node has no sibling (unpaired tail of an odd level) the entry is
/// the node's own digest, so the length is always `height - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(Vec<Digest>);

impl Proof {
    pub fn new(siblings: Vec<Digest>) -> Self {
        Self(siblings)
    }

    pub fn siblings(&self) -> &[Digest] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Digest> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Digest> {
        self.0
    }
}

impl From<Vec<Digest>> for Proof {
    fn from(siblings: Vec<Digest>) -> Self {
        Self(siblings)
    }
}

impl<'a> IntoIterator for &'a Proof {
    type Item = &'a Digest;
    type IntoIter = std::slice::Iter<'a, Digest>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parent of `node` at position `index` given its sibling
///
/// Even positions are left operands, odd positions right operands. This is
/// the only place the ordering is decided.
pub(crate) fn climb<H: HashFunction + ?Sized>(
    hasher: &H,
    index: usize,
    node: &Digest,
    sibling: &Digest,
) -> Digest {
    if index & 1 == 0 {
        combine(hasher, node, sibling)
    } else {
        combine(hasher, sibling, node)
    }
}

/// Recompute the root from `leaf` and `proof`; true iff it equals `root`
///
/// Side-effect free and never panics. Indices with bits set above the proof
/// depth cannot address a leaf in a tree that shallow and are rejected.
pub fn verify<H: HashFunction + ?Sized>(
    hasher: &H,
    root: &Digest,
    leaf: &Digest,
    proof: &Proof,
    index: u64,
) -> bool {
    if proof.len() < 64 && index >> proof.len() != 0 {
        return false;
    }

    let mut running = *leaf;
    let mut position = index;
    for sibling in proof {
        running = climb(hasher, (position & 1) as usize, &running, sibling);
        position >>= 1;
    }
    running == *root
}

/// Proof length for any leaf of a tree holding `leaf_count` leaves
///
/// Equals `height - 1`, that is `ceil(log2(leaf_count))`.
pub fn proof_len(leaf_count: u64) -> usize {
    if leaf_count <= 1 {
        return 0;
    }
    (u64::BITS - (leaf_count - 1).leading_zeros()) as usize
}

/// [`verify`] bound to the size of the committed tree
///
/// Rejects indices past the last leaf and proofs of any length other than
/// [`proof_len`]. Without the length check an internal node, presented as
/// `record || salt` over a shortened proof, would pass as a leaf.
pub fn verify_committed<H: HashFunction + ?Sized>(
    hasher: &H,
    root: &Digest,
    leaf_count: u64,
    leaf: &Digest,
    proof: &Proof,
    index: u64,
) -> bool {
    index < leaf_count
        && proof.len() == proof_len(leaf_count)
        && verify(hasher, root, leaf, proof, index)
}
