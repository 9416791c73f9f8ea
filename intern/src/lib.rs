//! Slab-backed byte-string interning store.
//!
//! This crate maps each distinct byte string to a single canonical copy in
//! densely packed, slab-backed memory and hands back a stable machine
//! address ([`SlotAddr`]) to use in its place. Repeated strings collapse to
//! one copy plus a reference count, which makes the address a cheap
//! identifier for high-cardinality data such as metric names, tag
//! dictionaries, and label sets.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------+
//! |                 InternStore                 |
//! |                                             |
//! |  +---------------------------------------+  |
//! |  | ObjectIndex                           |  |
//! |  | - payload hash -> SlotAddr            |  |
//! |  | - equality resolved through the store |  |
//! |  +---------------------------------------+  |
//! |        |                                    |
//! |        v                                    |
//! |  +---------------------------------------+  |
//! |  | ObjectStore                           |  |
//! |  | +-----------------------------------+ |  |
//! |  | | SlabPool (obj size 16)            | |  |
//! |  | | - slabs: [refcnt|payload] slots   | |  |
//! |  | +-----------------------------------+ |  |
//! |  | | SlabPool (obj size 23)            | |  |
//! |  | +-----------------------------------+ |  |
//! |  | | ...                               | |  |
//! |  | +-----------------------------------+ |  |
//! |  +---------------------------------------+  |
//! +---------------------------------------------+
//! ```
//!
//! Every slot starts with a 4-byte little-endian reference count; the
//! payload (compressed if a codec is configured) follows. The first
//! `add_or_get` of a payload stores it with count 1, later calls increment,
//! and the delete that drops the count from 1 to 0 removes the object and
//! eventually returns slab memory to the operating system.
//!
//! # Example
//!
//! ```
//! use intern_store::{Compression, InternConfig, InternStore};
//!
//! let store = InternStore::new(InternConfig {
//!     compression: Compression::None,
//!     ..InternConfig::default()
//! })?;
//!
//! let a = store.add_or_get(b"server.cpu.total")?;
//! let b = store.add_or_get(b"server.cpu.total")?;
//! assert_eq!(a, b);
//! assert_eq!(store.ref_count(a)?, 2);
//!
//! assert_eq!(store.obj_string(a)?, "server.cpu.total");
//!
//! assert!(!store.delete(a)?);
//! assert!(store.delete(a)?);
//! # Ok::<(), intern_store::InternError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod codec;
mod config;
mod error;
mod index;
mod mmap;
mod pool;
mod shoco;
mod slab;
mod slot;
mod stats;
mod store;

use std::borrow::Cow;

use parking_lot::RwLock;
use tracing::debug;

pub use config::{Compression, DEFAULT_SLAB_SIZE, InternConfig};
pub use error::{InternError, InternResult};
pub use slot::SlotAddr;
pub use stats::{PoolFragStats, PoolMemStats};

use codec::Codec;
use index::ObjectIndex;
use slot::{HEADER_SIZE, SlotHeader};
use store::ObjectStore;

/// Index and store structure, guarded together by the engine lock.
struct Inner {
    index: ObjectIndex,
    store: ObjectStore,
}

impl Inner {
    fn new(config: &InternConfig) -> Self {
        Self {
            index: ObjectIndex::new(),
            store: ObjectStore::new(config.slab_size),
        }
    }
}

/// The interning engine.
///
/// One reader-writer lock guards the index and the store structure. Lookups,
/// membership checks, and refcount changes that keep an object live run
/// under the shared lock with atomic counter updates; insertions, removals,
/// and [`reset`](Self::reset) take the exclusive lock. Every write path
/// re-checks state after upgrading, so concurrent callers interning the same
/// bytes converge on one slot.
///
/// # Zero-copy views
///
/// With [`Compression::None`] the `*_str`/`*_bytes` read paths return views
/// that alias live slot memory. A view is valid only while the caller holds
/// a reference to the object: the delete that drops the last reference frees
/// the slot and may unmap the backing slab. Callers must not retain a view
/// past that point, and must not mutate through it.
pub struct InternStore {
    config: InternConfig,
    codec: Codec,
    inner: RwLock<Inner>,
}

impl InternStore {
    /// Create a store from a configuration.
    ///
    /// Fails with [`InternError::BadConfiguration`] for the reserved
    /// `ShocoDict` selector or a zero `slab_size`.
    pub fn new(config: InternConfig) -> InternResult<Self> {
        let codec = Codec::new(config.compression)?;
        if config.slab_size == 0 {
            return Err(InternError::BadConfiguration);
        }
        debug!(
            compression = ?config.compression,
            slab_size = config.slab_size,
            "intern store created"
        );
        Ok(Self {
            inner: RwLock::new(Inner::new(&config)),
            codec,
            config,
        })
    }

    /// Intern `obj`, returning the address of its canonical copy.
    ///
    /// The payload is canonicalised by the configured codec first. A hit
    /// increments the object's reference count; a miss stores the payload
    /// with count 1.
    pub fn add_or_get(&self, obj: &[u8]) -> InternResult<SlotAddr> {
        let canonical = self.codec.compress(obj);

        {
            let inner = self.inner.read();
            if let Some(addr) = inner.index.lookup(&canonical, &inner.store) {
                // SAFETY: the slot is live while the shared lock is held.
                unsafe { SlotHeader::from_addr(addr) }.increment();
                return Ok(addr);
            }
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        // Re-check: another writer may have interned the same bytes between
        // the locks.
        if let Some(addr) = inner.index.lookup(&canonical, &inner.store) {
            // SAFETY: the slot is live while the exclusive lock is held.
            unsafe { SlotHeader::from_addr(addr) }.increment();
            return Ok(addr);
        }

        let mut slot = Vec::with_capacity(HEADER_SIZE + canonical.len());
        slot.extend_from_slice(&1u32.to_le_bytes());
        slot.extend_from_slice(&canonical);
        let addr = inner.store.add(&slot)?;
        let hash = inner.index.hash_payload(&canonical);
        inner.index.insert(hash, addr);
        Ok(addr)
    }

    /// Intern `obj` and return its string form.
    ///
    /// With [`Compression::None`] the result borrows the interned slot's
    /// payload, so repeated calls for the same bytes alias the same memory
    /// (see the type-level notes on zero-copy views). With compression on,
    /// the result is a freshly allocated copy equal to the input.
    ///
    /// Input that is not valid UTF-8 fails with
    /// [`InternError::InvalidUtf8`] and interns nothing.
    pub fn add_or_get_str(&self, obj: &[u8]) -> InternResult<Cow<'_, str>> {
        // Validate before the insert side effect: a UTF-8 failure after
        // interning would leak a reference the caller has no address to
        // delete.
        let s = std::str::from_utf8(obj).map_err(|_| InternError::InvalidUtf8)?;
        let addr = self.add_or_get(obj)?;
        if self.codec.is_identity() {
            let payload = self.aliased_payload(addr)?;
            std::str::from_utf8(payload)
                .map(Cow::Borrowed)
                .map_err(|_| InternError::InvalidUtf8)
        } else {
            Ok(Cow::Owned(s.to_owned()))
        }
    }

    /// Drop one reference to the object at `addr`.
    ///
    /// Returns `Ok(false)` if the object stays live, `Ok(true)` if this was
    /// the last reference and the object was removed. Unknown addresses fail
    /// with [`InternError::NotFound`].
    pub fn delete(&self, addr: SlotAddr) -> InternResult<bool> {
        {
            let inner = self.inner.read();
            if !inner.store.contains(addr) {
                return Err(InternError::NotFound);
            }
            // SAFETY: membership verified under the shared lock.
            if unsafe { SlotHeader::from_addr(addr) }.try_decrement_live() {
                return Ok(false);
            }
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if !inner.store.contains(addr) {
            return Err(InternError::NotFound);
        }
        // SAFETY: membership verified under the exclusive lock.
        let header = unsafe { SlotHeader::from_addr(addr) };
        if header.try_decrement_live() {
            // An increment slipped in between the locks.
            return Ok(false);
        }

        // Last reference. The index entry must go before the slot: freeing
        // may unmap the slab backing the payload bytes.
        let hash = {
            let payload = inner.store.payload(addr).ok_or(InternError::NotFound)?;
            inner.index.hash_payload(payload)
        };
        inner.index.remove(hash, addr);
        inner.store.delete(addr)?;
        Ok(true)
    }

    /// Drop one reference to the object whose bytes equal `obj`.
    pub fn delete_by_bytes(&self, obj: &[u8]) -> InternResult<bool> {
        let canonical = self.codec.compress(obj);
        let addr = {
            let inner = self.inner.read();
            inner
                .index
                .lookup(&canonical, &inner.store)
                .ok_or(InternError::NotFound)?
        };
        self.delete(addr)
    }

    /// Drop one reference to the object whose bytes equal `s`.
    pub fn delete_by_str(&self, s: &str) -> InternResult<bool> {
        self.delete_by_bytes(s.as_bytes())
    }

    /// Drop one reference to every address in `addrs`.
    ///
    /// Two-phase: a shared-lock pass decrements objects that stay live, then
    /// an exclusive pass removes the rest after re-verifying their counts.
    /// Unknown addresses and per-address failures are skipped silently.
    pub fn delete_batch(&self, addrs: &[SlotAddr]) {
        let mut pending = Vec::new();
        {
            let inner = self.inner.read();
            for &addr in addrs {
                if !inner.store.contains(addr) {
                    continue;
                }
                // SAFETY: membership verified under the shared lock.
                if !unsafe { SlotHeader::from_addr(addr) }.try_decrement_live() {
                    pending.push(addr);
                }
            }
        }
        if pending.is_empty() {
            return;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        for addr in pending {
            if !inner.store.contains(addr) {
                continue;
            }
            // SAFETY: membership verified under the exclusive lock.
            if unsafe { SlotHeader::from_addr(addr) }.try_decrement_live() {
                continue;
            }
            let Some(payload) = inner.store.payload(addr) else {
                continue;
            };
            let hash = inner.index.hash_payload(payload);
            inner.index.remove(hash, addr);
            let _ = inner.store.delete(addr);
        }
    }

    /// Current reference count of the object at `addr`.
    pub fn ref_count(&self, addr: SlotAddr) -> InternResult<u32> {
        let inner = self.inner.read();
        if !inner.store.contains(addr) {
            return Err(InternError::NotFound);
        }
        // SAFETY: membership verified under the shared lock.
        Ok(unsafe { SlotHeader::from_addr(addr) }.refs())
    }

    /// Add one reference to the object at `addr`; returns the new count.
    ///
    /// Never touches the index. The count saturates at `u32::MAX`.
    pub fn inc_ref_count(&self, addr: SlotAddr) -> InternResult<u32> {
        let inner = self.inner.read();
        if !inner.store.contains(addr) {
            return Err(InternError::NotFound);
        }
        // SAFETY: membership verified under the shared lock.
        Ok(unsafe { SlotHeader::from_addr(addr) }.increment())
    }

    /// Add one reference to the object whose bytes equal `s`.
    pub fn inc_ref_count_by_str(&self, s: &str) -> InternResult<u32> {
        let canonical = self.codec.compress(s.as_bytes());
        let inner = self.inner.read();
        let addr = inner
            .index
            .lookup(&canonical, &inner.store)
            .ok_or(InternError::NotFound)?;
        // SAFETY: the slot is live while the shared lock is held.
        Ok(unsafe { SlotHeader::from_addr(addr) }.increment())
    }

    /// Add one reference to every known address in `addrs`.
    ///
    /// Unknown addresses are skipped.
    pub fn inc_ref_count_batch(&self, addrs: &[SlotAddr]) {
        let inner = self.inner.read();
        for &addr in addrs {
            if inner.store.contains(addr) {
                // SAFETY: membership verified under the shared lock.
                unsafe { SlotHeader::from_addr(addr) }.increment();
            }
        }
    }

    /// Reference count of `addr` without membership checks or locking.
    ///
    /// # Safety
    ///
    /// `addr` must have been returned by [`add_or_get`](Self::add_or_get)
    /// on this store, and the caller must hold a reference that keeps the
    /// object live for the duration of the call.
    pub unsafe fn ref_count_unchecked(&self, addr: SlotAddr) -> u32 {
        // SAFETY: liveness is guaranteed by the caller.
        unsafe { SlotHeader::from_addr(addr) }.refs()
    }

    /// Add one reference to `addr` without membership checks or locking.
    ///
    /// # Safety
    ///
    /// Same contract as [`ref_count_unchecked`](Self::ref_count_unchecked).
    pub unsafe fn inc_ref_count_unchecked(&self, addr: SlotAddr) -> u32 {
        // SAFETY: liveness is guaranteed by the caller.
        unsafe { SlotHeader::from_addr(addr) }.increment()
    }

    /// Address of the object whose bytes equal `obj`, without changing its
    /// reference count.
    pub fn get_addr(&self, obj: &[u8]) -> InternResult<SlotAddr> {
        let canonical = self.codec.compress(obj);
        let inner = self.inner.read();
        inner
            .index
            .lookup(&canonical, &inner.store)
            .ok_or(InternError::NotFound)
    }

    /// Payload bytes of the object at `addr`.
    ///
    /// With [`Compression::None`] the result aliases the live slot (see the
    /// type-level notes); otherwise it is a fresh decompressed copy.
    pub fn obj_bytes(&self, addr: SlotAddr) -> InternResult<Cow<'_, [u8]>> {
        if self.codec.is_identity() {
            return self.aliased_payload(addr).map(Cow::Borrowed);
        }
        let inner = self.inner.read();
        let payload = inner.store.payload(addr).ok_or(InternError::NotFound)?;
        self.codec
            .decompress(payload)
            .map(|bytes| Cow::Owned(bytes.into_owned()))
    }

    /// String form of the object at `addr`.
    ///
    /// Aliases the slot payload when uncompressed, decompresses into a fresh
    /// string otherwise.
    pub fn obj_str(&self, addr: SlotAddr) -> InternResult<Cow<'_, str>> {
        match self.obj_bytes(addr)? {
            Cow::Borrowed(bytes) => std::str::from_utf8(bytes)
                .map(Cow::Borrowed)
                .map_err(|_| InternError::InvalidUtf8),
            Cow::Owned(bytes) => String::from_utf8(bytes)
                .map(Cow::Owned)
                .map_err(|_| InternError::InvalidUtf8),
        }
    }

    /// Freshly allocated string form of the object at `addr`. Never aliases
    /// slot memory.
    pub fn obj_string(&self, addr: SlotAddr) -> InternResult<String> {
        let inner = self.inner.read();
        let payload = inner.store.payload(addr).ok_or(InternError::NotFound)?;
        let bytes = self.codec.decompress(payload)?;
        String::from_utf8(bytes.into_owned()).map_err(|_| InternError::InvalidUtf8)
    }

    /// Payload lengths for `addrs`.
    ///
    /// Unknown addresses are skipped and reported through `complete = false`
    /// in the second tuple field.
    pub fn payload_lens(&self, addrs: &[SlotAddr]) -> (Vec<usize>, bool) {
        let inner = self.inner.read();
        let mut lens = Vec::with_capacity(addrs.len());
        let mut complete = true;
        for &addr in addrs {
            match inner.store.payload_len(addr) {
                Some(len) => lens.push(len),
                None => complete = false,
            }
        }
        (lens, complete)
    }

    /// Join the payloads at `addrs` with `sep`.
    ///
    /// An empty address list fails with [`InternError::Empty`]; a single
    /// address yields that payload alone. Payload bytes are read zero-copy
    /// when uncompressed and decompressed per element otherwise.
    pub fn join_strings(&self, addrs: &[SlotAddr], sep: &str) -> InternResult<String> {
        if addrs.is_empty() {
            return Err(InternError::Empty);
        }

        let inner = self.inner.read();
        let mut parts = Vec::with_capacity(addrs.len());
        let mut total = 0;
        for &addr in addrs {
            let payload = inner.store.payload(addr).ok_or(InternError::NotFound)?;
            let part = self.codec.decompress(payload)?;
            total += part.len();
            parts.push(part);
        }

        let mut joined = String::with_capacity(total + sep.len() * (parts.len() - 1));
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                joined.push_str(sep);
            }
            joined.push_str(std::str::from_utf8(part).map_err(|_| InternError::InvalidUtf8)?);
        }
        Ok(joined)
    }

    /// Discard every interned object and return all slab memory.
    ///
    /// Previously returned addresses become unknown. Index and store are
    /// torn down together, so no index entry can outlive its slot.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        let objects = inner.index.len();
        *inner = Inner::new(&self.config);
        debug!(objects, "store reset");
    }

    /// Compress `obj` with the configured codec.
    pub fn compress<'a>(&self, obj: &'a [u8]) -> Cow<'a, [u8]> {
        self.codec.compress(obj)
    }

    /// Decompress codec output back into caller bytes.
    pub fn decompress<'a>(&self, obj: &'a [u8]) -> InternResult<Cow<'a, [u8]>> {
        self.codec.decompress(obj)
    }

    /// Compress a string with the configured codec.
    ///
    /// Codec output is raw bytes, not UTF-8.
    pub fn compress_str(&self, s: &str) -> Vec<u8> {
        self.codec.compress(s.as_bytes()).into_owned()
    }

    /// Decompress codec output back into a string.
    pub fn decompress_str(&self, obj: &[u8]) -> InternResult<String> {
        String::from_utf8(self.codec.decompress(obj)?.into_owned())
            .map_err(|_| InternError::InvalidUtf8)
    }

    /// Memory statistics per size-class pool, ordered by object size.
    pub fn mem_stats_per_pool(&self) -> Vec<PoolMemStats> {
        self.inner.read().store.mem_stats_per_pool()
    }

    /// Total mapped bytes across all pools.
    pub fn mem_stats_total(&self) -> usize {
        self.inner.read().store.mem_stats_total()
    }

    /// Fragmentation statistics per size-class pool, ordered by object size.
    pub fn frag_stats_per_pool(&self) -> Vec<PoolFragStats> {
        self.inner.read().store.frag_stats_per_pool()
    }

    /// Overall share of mapped slots not holding an object.
    pub fn frag_stats_total(&self) -> f64 {
        self.inner.read().store.frag_stats_total()
    }

    /// Number of interned objects.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.inner.read().index.is_empty()
    }

    /// Zero-copy payload view for the identity codec.
    fn aliased_payload(&self, addr: SlotAddr) -> InternResult<&[u8]> {
        let inner = self.inner.read();
        let payload = inner.store.payload(addr).ok_or(InternError::NotFound)?;
        let (ptr, len) = (payload.as_ptr(), payload.len());
        // SAFETY: the slot stays mapped until its refcount reaches zero,
        // which cannot happen while the caller holds the reference this
        // view rides on.
        Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
    }
}
