//! Authenticated tree over salted leaves
//!
//! Levels are stored bottom-up as plain vectors: `levels[0]` holds one leaf
//! digest per record and the last level holds the root. Each level has
//! `ceil(len / 2)` entries of the level below it, and an unpaired tail entry
//! is combined with itself.
//!
//! ```text
//! level 3                 r
//!                  /             \
//! level 2        n0               n1
//!              /    \            /  \
//! level 1    p0      p1        p2    (p2)
//!           /  \    /  \      /  \
//! level 0  l0  l1  l2  l3    l4  (l4)
//! ```
//!
//! Inserting or tombstoning rewrites only the nodes on one leaf-to-root path.
//! New digests for the path are computed first and written afterwards, so a
//! rejected mutation never leaves a half-updated tree behind.

use std::fmt;

use rand::rngs::OsRng;

use crate::error::Error;
use crate::hash::{Blake3Hasher, Digest, HashFunction};
use crate::leaf::{check_record_len, tombstone_digest, LeafSlot, Salt, SaltSource};
use crate::proof::{climb, Proof};
use crate::Result;

/// Salted, incrementally maintained hash tree
pub struct AuthenticatedTree<H: HashFunction = Blake3Hasher> {
    hasher: H,
    slots: Vec<LeafSlot>,
    levels: Vec<Vec<Digest>>,
    salts: Box<dyn SaltSource>,
}

impl<H: HashFunction> AuthenticatedTree<H> {
    /// Build from a non-empty sequence of records, salting from the OS RNG
    pub fn build<I, R>(hasher: H, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<Vec<u8>>,
    {
        Self::build_with_salts(hasher, records, OsRng)
    }

    /// Build with an explicit salt source
    pub fn build_with_salts<I, R, S>(hasher: H, records: I, mut salts: S) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<Vec<u8>>,
        S: SaltSource + 'static,
    {
        let slots = records
            .into_iter()
            .map(|record| {
                let record: Vec<u8> = record.into();
                check_record_len(record.len())?;
                Ok(LeafSlot::live(record, salts.next_salt()))
            })
            .collect::<Result<Vec<LeafSlot>>>()?;
        Self::from_slots(hasher, slots, Box::new(salts))
    }

    /// Rebuild every level from existing slots (salts are kept as-is)
    pub(crate) fn from_slots(
        hasher: H,
        slots: Vec<LeafSlot>,
        salts: Box<dyn SaltSource>,
    ) -> Result<Self> {
        if slots.is_empty() {
            return Err(Error::EmptyInput);
        }
        let leaves = slots.iter().map(|slot| slot.digest(&hasher)).collect();
        let levels = build_levels(&hasher, leaves);
        Ok(Self {
            hasher,
            slots,
            levels,
            salts,
        })
    }

    /// Replace the salt source used by future inserts
    pub fn set_salt_source(&mut self, salts: impl SaltSource + 'static) {
        self.salts = Box::new(salts);
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Current root digest
    pub fn root(&self) -> Digest {
        // levels is never empty and the top level always has exactly one node
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of leaves, tombstoned ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a tree cannot be built empty and never shrinks
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of levels, leaves and root included
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    pub fn slots(&self) -> &[LeafSlot] {
        &self.slots
    }

    pub fn tombstone_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_tombstoned()).count()
    }

    pub fn leaf(&self, index: u64) -> Result<Digest> {
        let index = self.check_index(index)?;
        Ok(self.levels[0][index])
    }

    pub fn salt(&self, index: u64) -> Result<Salt> {
        let index = self.check_index(index)?;
        Ok(*self.slots[index].salt())
    }

    pub fn is_tombstoned(&self, index: u64) -> Result<bool> {
        let index = self.check_index(index)?;
        Ok(self.slots[index].is_tombstoned())
    }

    /// Record stored at `index`; tombstoned slots are unavailable
    pub fn record(&self, index: u64) -> Result<&[u8]> {
        let position = self.check_index(index)?;
        self.slots[position]
            .record()
            .ok_or(Error::RecordUnavailable { index })
    }

    /// Sibling path for `index`
    pub fn prove(&self, index: u64) -> Result<Proof> {
        let mut position = self.check_index(index)?;
        let below_root = &self.levels[..self.levels.len() - 1];

        let mut siblings = Vec::with_capacity(below_root.len());
        for level in below_root {
            let sibling = level.get(position ^ 1).unwrap_or(&level[position]);
            siblings.push(*sibling);
            position /= 2;
        }
        Ok(Proof::new(siblings))
    }

    /// Append a freshly salted record; returns its index
    ///
    /// Touches one node per level. The resulting levels are identical to a
    /// full rebuild over the same leaves. An oversized record leaves the tree
    /// untouched.
    pub fn insert(&mut self, record: impl Into<Vec<u8>>) -> Result<u64> {
        let record: Vec<u8> = record.into();
        check_record_len(record.len())?;
        let salt = self.salts.next_salt();
        let slot = LeafSlot::live(record, salt);
        let leaf = slot.digest(&self.hasher);

        let index = self.slots.len();
        let path = self.insertion_path(index, leaf);

        self.slots.push(slot);
        let mut position = index;
        for (level, digest) in path.into_iter().enumerate() {
            if level == self.levels.len() {
                self.levels.push(Vec::new());
            }
            let nodes = &mut self.levels[level];
            if position == nodes.len() {
                nodes.push(digest);
            } else {
                nodes[position] = digest;
            }
            position /= 2;
        }

        Ok(index as u64)
    }

    /// Digests along the path of a new leaf placed at `index`, leaf first
    ///
    /// The new node is always the rightmost one of its level, so its sibling
    /// either already exists on the left or is absent and the node pairs with
    /// itself. The walk stops at the first level holding a single node.
    fn insertion_path(&self, index: usize, leaf: Digest) -> Vec<Digest> {
        let mut path = Vec::with_capacity(self.levels.len() + 1);
        let mut current = leaf;
        let mut position = index;
        let mut level = 0;

        loop {
            path.push(current);
            let existing = self.levels.get(level);
            let width = existing.map_or(0, Vec::len).max(position + 1);
            if width == 1 {
                break;
            }

            let sibling = existing
                .and_then(|nodes| nodes.get(position ^ 1))
                .copied()
                .unwrap_or(current);
            current = climb(&self.hasher, position, &current, &sibling);
            position /= 2;
            level += 1;
        }

        path
    }

    /// Logically delete the record at `index`
    ///
    /// The slot keeps its index and salt; its leaf becomes
    /// `H(sentinel || salt)` and every ancestor is recomputed. Tombstoning an
    /// already tombstoned slot changes nothing.
    pub fn tombstone(&mut self, index: u64) -> Result<()> {
        let position = self.check_index(index)?;
        let leaf = tombstone_digest(&self.hasher, self.slots[position].salt());
        let path = self.repair_path(position, leaf);

        self.slots[position].tombstone();
        let mut position = position;
        for (level, digest) in path.into_iter().enumerate() {
            self.levels[level][position] = digest;
            position /= 2;
        }
        Ok(())
    }

    /// Digests along the path of an existing leaf replaced by `leaf`
    fn repair_path(&self, index: usize, leaf: Digest) -> Vec<Digest> {
        let mut path = Vec::with_capacity(self.levels.len());
        let mut current = leaf;
        let mut position = index;

        path.push(current);
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = level.get(position ^ 1).copied().unwrap_or(current);
            current = climb(&self.hasher, position, &current, &sibling);
            position /= 2;
            path.push(current);
        }
        path
    }

    fn check_index(&self, index: u64) -> Result<usize> {
        let size = self.slots.len() as u64;
        if index >= size {
            return Err(Error::IndexOutOfRange { index, size });
        }
        Ok(index as usize)
    }
}

impl<H: HashFunction> fmt::Debug for AuthenticatedTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedTree")
            .field("hasher", &self.hasher.name())
            .field("leaves", &self.slots.len())
            .field("height", &self.levels.len())
            .field("root", &self.root())
            .finish()
    }
}

/// Full bottom-up build from leaf digests
pub(crate) fn build_levels<H: HashFunction + ?Sized>(
    hasher: &H,
    leaves: Vec<Digest>,
) -> Vec<Vec<Digest>> {
    let mut levels = vec![leaves];
    loop {
        let top = &levels[levels.len() - 1];
        if top.len() <= 1 {
            break;
        }
        let next: Vec<Digest> = top
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                crate::hash::combine(hasher, left, right)
            })
            .collect();
        levels.push(next);
    }
    levels
}
