//! Configuration types for the intern store.

/// Default number of slots per newly created slab.
pub const DEFAULT_SLAB_SIZE: usize = 100;

/// Payload compression selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Identity codec. Stored bytes equal the caller's bytes, which enables
    /// the zero-copy read paths.
    None,
    /// Short-string coder tuned for metric names and tag values.
    #[default]
    Shoco,
    /// Dictionary-trained variant. Reserved; construction fails.
    ShocoDict,
}

/// Configuration for [`InternStore`](crate::InternStore).
///
/// `slab_size` is the slot count of each newly mapped slab, not a byte size:
/// a pool for objects of width `w` maps slabs of roughly `w * slab_size`
/// bytes.
#[derive(Debug, Clone)]
pub struct InternConfig {
    /// Payload compression applied before storage and index lookup.
    pub compression: Compression,
    /// Slots per slab for newly created pools.
    pub slab_size: usize,
}

impl Default for InternConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Shoco,
            slab_size: DEFAULT_SLAB_SIZE,
        }
    }
}
