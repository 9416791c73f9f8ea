//! Content-addressed index from canonical payload bytes to slot address.
//!
//! The index owns no key storage. Entries are 64-bit content hashes plus
//! slot addresses; equality is resolved by dereferencing the candidate
//! slot's payload through a [`PayloadResolver`] (implemented by the store).
//!
//! Entries must be removed *before* their slot is freed: once the backing
//! slab is unmapped, resolving the entry would dereference unmapped memory.

use std::collections::HashMap;
use std::hash::BuildHasher;

use ahash::RandomState;

use crate::slot::SlotAddr;

/// Resolves a slot address to its live payload bytes.
///
/// The index calls this during lookup and removal to turn compact entries
/// back into comparable bytes.
pub(crate) trait PayloadResolver {
    /// Payload bytes of the slot at `addr`, or `None` if the slot is gone.
    fn payload_at(&self, addr: SlotAddr) -> Option<&[u8]>;
}

/// Mapping from canonical payload bytes to the interned slot address.
pub(crate) struct ObjectIndex {
    hasher: RandomState,
    /// Content hash -> addresses with that hash. Chains are almost always
    /// one entry long.
    buckets: HashMap<u64, Vec<SlotAddr>, RandomState>,
    len: usize,
}

impl ObjectIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            buckets: HashMap::default(),
            len: 0,
        }
    }

    /// Content hash of a payload, as used for insert/remove pairing.
    #[inline]
    pub fn hash_payload(&self, payload: &[u8]) -> u64 {
        self.hasher.hash_one(payload)
    }

    /// Find the address whose slot payload equals `payload`.
    pub fn lookup(&self, payload: &[u8], resolver: &impl PayloadResolver) -> Option<SlotAddr> {
        let chain = self.buckets.get(&self.hash_payload(payload))?;
        chain
            .iter()
            .copied()
            .find(|&addr| resolver.payload_at(addr) == Some(payload))
    }

    /// Record `addr` under a payload hash.
    ///
    /// The caller guarantees the slot at `addr` is live and its payload is
    /// the bytes that produced `hash`.
    pub fn insert(&mut self, hash: u64, addr: SlotAddr) {
        self.buckets.entry(hash).or_default().push(addr);
        self.len += 1;
    }

    /// Remove the entry for `addr` under `hash`.
    ///
    /// Must run before the slot at `addr` is freed.
    pub fn remove(&mut self, hash: u64, addr: SlotAddr) -> bool {
        let Some(chain) = self.buckets.get_mut(&hash) else {
            return false;
        };
        let Some(at) = chain.iter().position(|&a| a == addr) else {
            return false;
        };
        chain.swap_remove(at);
        if chain.is_empty() {
            self.buckets.remove(&hash);
        }
        self.len -= 1;
        true
    }

    /// Number of indexed objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
