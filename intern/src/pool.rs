//! Pools of slabs serving a single size class.
//!
//! A pool keeps its slabs ordered by base address so an address resolves to
//! its owning slab by binary search. A cursor remembers the slab that last
//! had a free slot, which keeps allocation O(1) while the working set is
//! stable. Slabs that become empty are unmapped immediately.

use tracing::{debug, warn};

use crate::error::{InternError, InternResult};
use crate::slab::Slab;
use crate::slot::{HEADER_SIZE, SlotAddr};

/// All slabs of one exact object size.
pub(crate) struct SlabPool {
    /// Exact slot length (payload + header). The size-class key.
    obj_size: usize,
    /// Slot placement stride: `obj_size` rounded up so the refcount word at
    /// the slot start stays 4-byte aligned.
    stride: usize,
    /// Slot count for newly mapped slabs.
    slots_per_slab: usize,
    /// Slabs ordered by base address.
    slabs: Vec<Slab>,
    /// Index of the slab most likely to have a free slot.
    cursor: usize,
}

impl SlabPool {
    /// Create an empty pool for objects of `obj_size` bytes.
    pub fn new(obj_size: usize, slots_per_slab: usize) -> Self {
        debug_assert!(obj_size >= HEADER_SIZE);
        debug_assert!(slots_per_slab > 0);
        Self {
            obj_size,
            stride: obj_size.next_multiple_of(HEADER_SIZE),
            slots_per_slab,
            slabs: Vec::new(),
            cursor: 0,
        }
    }

    /// The exact object size this pool serves.
    #[inline]
    pub fn obj_size(&self) -> usize {
        self.obj_size
    }

    /// Payload length of every object in this pool.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.obj_size - HEADER_SIZE
    }

    /// Whether the pool holds no slabs at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slabs.is_empty()
    }

    /// Claim a free slot, mapping a fresh slab if every slab is full.
    pub fn allocate(&mut self) -> InternResult<SlotAddr> {
        if let Some(slab) = self.slabs.get_mut(self.cursor) {
            if let Some(addr) = slab.claim() {
                return Ok(addr);
            }
        }
        for (i, slab) in self.slabs.iter_mut().enumerate() {
            if let Some(addr) = slab.claim() {
                self.cursor = i;
                return Ok(addr);
            }
        }

        let mut slab = match Slab::new(self.stride, self.slots_per_slab) {
            Ok(slab) => slab,
            Err(err) => {
                warn!(obj_size = self.obj_size, %err, "slab mapping failed");
                return Err(InternError::AllocationFailed);
            }
        };
        debug!(
            obj_size = self.obj_size,
            slots = self.slots_per_slab,
            base = slab.base(),
            "mapped new slab"
        );
        let addr = slab.claim().ok_or(InternError::AllocationFailed)?;

        // Keep the slab list ordered by base address for binary search.
        let at = self.slabs.partition_point(|s| s.base() < slab.base());
        self.slabs.insert(at, slab);
        self.cursor = at;
        Ok(addr)
    }

    /// Release the slot at `addr`, unmapping its slab if it becomes empty.
    pub fn free(&mut self, addr: SlotAddr) -> InternResult<()> {
        let i = self.find_slab(addr).ok_or(InternError::NotFound)?;
        if self.slabs[i].release(addr) {
            let slab = self.slabs.remove(i);
            debug!(obj_size = self.obj_size, base = slab.base(), "unmapped empty slab");
            if self.cursor > i {
                self.cursor -= 1;
            } else if self.cursor == i {
                self.cursor = 0;
            }
        }
        Ok(())
    }

    /// Whether `addr` is a slot boundary inside one of this pool's slabs.
    #[inline]
    pub fn contains(&self, addr: SlotAddr) -> bool {
        self.find_slab(addr).is_some()
    }

    /// Locate the slab owning `addr` by binary search over base addresses.
    fn find_slab(&self, addr: SlotAddr) -> Option<usize> {
        let raw = addr.as_usize();
        let i = self.slabs.partition_point(|s| s.base() <= raw);
        let candidate = i.checked_sub(1)?;
        self.slabs[candidate].contains(addr).then_some(candidate)
    }

    /// Total mapped bytes across all slabs.
    pub fn mapped_bytes(&self) -> usize {
        self.slabs.iter().map(Slab::mapped_bytes).sum()
    }

    /// Slots currently in use.
    pub fn live_slots(&self) -> usize {
        self.slabs.iter().map(Slab::live).sum()
    }

    /// Slots available across all mapped slabs.
    pub fn total_slots(&self) -> usize {
        self.slabs.iter().map(Slab::slots).sum()
    }
}
