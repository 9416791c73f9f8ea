//! The object store: size-class pools and raw slot storage.
//!
//! The store owns all slot memory. Size classes are exact slot lengths
//! (payload + header), created lazily on first insertion of a new length.
//! Address-to-pool resolution queries each pool's slab list; within a pool
//! the slab is found by binary search.

use std::collections::HashMap;

use ahash::RandomState;
use tracing::debug;

use crate::error::{InternError, InternResult};
use crate::index::PayloadResolver;
use crate::pool::SlabPool;
use crate::slot::{HEADER_SIZE, SlotAddr};
use crate::stats::{PoolFragStats, PoolMemStats};

/// Slot storage multiplexed over size-class pools.
pub(crate) struct ObjectStore {
    pools: HashMap<usize, SlabPool, RandomState>,
    slots_per_slab: usize,
}

impl ObjectStore {
    /// Create an empty store; pools appear on first use.
    pub fn new(slots_per_slab: usize) -> Self {
        Self {
            pools: HashMap::default(),
            slots_per_slab,
        }
    }

    /// Copy a complete slot image (header + payload) into a claimed slot.
    ///
    /// The size class is the exact image length.
    pub fn add(&mut self, slot_image: &[u8]) -> InternResult<SlotAddr> {
        debug_assert!(slot_image.len() >= HEADER_SIZE);
        let size = slot_image.len();
        let slots_per_slab = self.slots_per_slab;
        let pool = self.pools.entry(size).or_insert_with(|| {
            debug!(obj_size = size, "created size-class pool");
            SlabPool::new(size, slots_per_slab)
        });
        let addr = match pool.allocate() {
            Ok(addr) => addr,
            Err(err) => {
                // A pool that never mapped a slab must not linger in the
                // stats.
                if pool.is_empty() {
                    self.pools.remove(&size);
                }
                return Err(err);
            }
        };
        // SAFETY: the claimed slot is obj_size bytes of exclusively owned
        // slab memory.
        unsafe {
            std::ptr::copy_nonoverlapping(slot_image.as_ptr(), addr.as_mut_ptr(), size);
        }
        Ok(addr)
    }

    /// Full slot view (header + payload), or `None` if no pool owns `addr`.
    ///
    /// The view aliases the slot and is valid only while the slot is live.
    pub fn get(&self, addr: SlotAddr) -> Option<&[u8]> {
        let pool = self.find_pool(addr)?;
        // SAFETY: the pool owns a live slot of exactly obj_size bytes at addr.
        Some(unsafe { std::slice::from_raw_parts(addr.as_ptr(), pool.obj_size()) })
    }

    /// Payload view of the slot at `addr` (header skipped).
    #[inline]
    pub fn payload(&self, addr: SlotAddr) -> Option<&[u8]> {
        self.get(addr).map(|slot| &slot[HEADER_SIZE..])
    }

    /// Payload length of the slot at `addr`.
    #[inline]
    pub fn payload_len(&self, addr: SlotAddr) -> Option<usize> {
        self.find_pool(addr).map(SlabPool::payload_len)
    }

    /// Whether any pool owns `addr`.
    #[inline]
    pub fn contains(&self, addr: SlotAddr) -> bool {
        self.find_pool(addr).is_some()
    }

    /// Release the slot at `addr`, dropping its pool if it empties.
    pub fn delete(&mut self, addr: SlotAddr) -> InternResult<()> {
        let size = self
            .pools
            .iter()
            .find(|(_, pool)| pool.contains(addr))
            .map(|(&size, _)| size)
            .ok_or(InternError::NotFound)?;
        let pool = self.pools.get_mut(&size).ok_or(InternError::NotFound)?;
        pool.free(addr)?;
        if pool.is_empty() {
            self.pools.remove(&size);
            debug!(obj_size = size, "removed empty size-class pool");
        }
        Ok(())
    }

    fn find_pool(&self, addr: SlotAddr) -> Option<&SlabPool> {
        self.pools.values().find(|pool| pool.contains(addr))
    }

    /// Memory statistics per pool, ordered by object size.
    pub fn mem_stats_per_pool(&self) -> Vec<PoolMemStats> {
        let mut stats: Vec<_> = self
            .pools
            .values()
            .map(|pool| PoolMemStats {
                obj_size: pool.obj_size(),
                mem_used: pool.mapped_bytes(),
            })
            .collect();
        stats.sort_by_key(|s| s.obj_size);
        stats
    }

    /// Total mapped bytes across all pools.
    pub fn mem_stats_total(&self) -> usize {
        self.pools.values().map(SlabPool::mapped_bytes).sum()
    }

    /// Fragmentation statistics per pool, ordered by object size.
    pub fn frag_stats_per_pool(&self) -> Vec<PoolFragStats> {
        let mut stats: Vec<_> = self
            .pools
            .values()
            .map(|pool| PoolFragStats::new(pool.obj_size(), pool.live_slots(), pool.total_slots()))
            .collect();
        stats.sort_by_key(|s| s.obj_size);
        stats
    }

    /// Overall share of mapped slots not holding an object.
    pub fn frag_stats_total(&self) -> f64 {
        let used: usize = self.pools.values().map(SlabPool::live_slots).sum();
        let total: usize = self.pools.values().map(SlabPool::total_slots).sum();
        crate::stats::frag_percent(used, total)
    }
}

impl PayloadResolver for ObjectStore {
    #[inline]
    fn payload_at(&self, addr: SlotAddr) -> Option<&[u8]> {
        self.payload(addr)
    }
}
