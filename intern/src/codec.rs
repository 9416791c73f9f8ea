//! Codec selection and dispatch.
//!
//! The engine treats compression as a pure byte-to-byte function pair. The
//! identity codec returns borrowed input so the zero-copy read paths can
//! rely on stored bytes equaling caller bytes.

use std::borrow::Cow;

use crate::config::Compression;
use crate::error::{InternError, InternResult};
use crate::shoco;

/// Resolved codec for an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Codec {
    /// Identity: stored bytes are the caller's bytes.
    Identity,
    /// Short-string coder.
    Shoco,
}

impl Codec {
    /// Resolve a configuration selector into a codec.
    ///
    /// `ShocoDict` is reserved and rejected.
    pub fn new(compression: Compression) -> InternResult<Self> {
        match compression {
            Compression::None => Ok(Self::Identity),
            Compression::Shoco => Ok(Self::Shoco),
            Compression::ShocoDict => Err(InternError::BadConfiguration),
        }
    }

    /// Whether stored bytes equal caller bytes (zero-copy reads allowed).
    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Compress `obj` into its canonical stored form.
    ///
    /// The identity codec returns the borrowed input.
    pub fn compress<'a>(&self, obj: &'a [u8]) -> Cow<'a, [u8]> {
        match self {
            Self::Identity => Cow::Borrowed(obj),
            Self::Shoco => Cow::Owned(shoco::compress(obj)),
        }
    }

    /// Decompress stored bytes back into caller form.
    pub fn decompress<'a>(&self, obj: &'a [u8]) -> InternResult<Cow<'a, [u8]>> {
        match self {
            Self::Identity => Ok(Cow::Borrowed(obj)),
            Self::Shoco => shoco::decompress(obj)
                .map(Cow::Owned)
                .ok_or(InternError::DecompressionFailed),
        }
    }
}
