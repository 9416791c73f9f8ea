//! Slot addresses and the in-slot reference count header.
//!
//! Every slot starts with a 4-byte little-endian reference count followed by
//! the payload bytes. The slot address is the address of the refcount word,
//! so refcount operations need no offset arithmetic and the index key always
//! starts at `addr + HEADER_SIZE`.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Size of the per-slot header: one 32-bit reference count.
pub const HEADER_SIZE: usize = 4;

/// Opaque address of an interned object.
///
/// A `SlotAddr` is handed out by [`InternStore`](crate::InternStore) and is
/// valid for as long as the caller holds a reference to the object. Holding
/// an address without holding a reference is undefined: the slot may be
/// freed and its slab unmapped at any time.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddr(usize);

impl SlotAddr {
    /// Wrap a raw slot address.
    #[inline]
    pub(crate) fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw machine address of the slot.
    #[inline]
    pub fn as_usize(&self) -> usize {
        self.0
    }

    /// Pointer to the slot start (the refcount word).
    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.0 as *const u8
    }

    /// Mutable pointer to the slot start.
    #[inline]
    pub(crate) fn as_mut_ptr(&self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl fmt::Debug for SlotAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotAddr({:#x})", self.0)
    }
}

/// The reference count word at the start of a slot.
///
/// Increments and live decrements are lock-free atomics; the 1 -> 0
/// transition never happens here — deletion re-checks the count under the
/// engine's exclusive lock and frees the slot through the store.
#[repr(C)]
pub struct SlotHeader {
    refs: AtomicU32,
}

const _: () = assert!(std::mem::size_of::<SlotHeader>() == HEADER_SIZE);

impl SlotHeader {
    /// View the header at a slot address.
    ///
    /// # Safety
    ///
    /// `addr` must be the 4-byte-aligned start of a live slot. The returned
    /// reference must not outlive the slot.
    #[inline]
    pub(crate) unsafe fn from_addr<'a>(addr: SlotAddr) -> &'a Self {
        // SAFETY: caller guarantees addr points at a live, aligned slot header.
        unsafe { &*(addr.as_ptr() as *const SlotHeader) }
    }

    /// Current reference count.
    #[inline]
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Add one reference, saturating at `u32::MAX`.
    ///
    /// A saturated object is never freed by `delete`, which is the
    /// conservative outcome of counter exhaustion. Returns the new count.
    #[inline]
    pub fn increment(&self) -> u32 {
        match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
        {
            Ok(prev) => prev + 1,
            Err(prev) => prev,
        }
    }

    /// Drop one reference, but only while the object stays live.
    ///
    /// Returns `true` if the count was above one and has been decremented.
    /// Returns `false` when the count is one: crossing to zero frees the
    /// slot and must run under the exclusive lock.
    #[inline]
    pub fn try_decrement_live(&self) -> bool {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                if c > 1 { Some(c - 1) } else { None }
            })
            .is_ok()
    }
}
