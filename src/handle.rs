//! Opaque allocation handle.
//!
//! A plain wrapping `u64`, matching the original's `AllocHandle` contract: `0`
//! is reserved for "invalid", and the metadata implementation is free to
//! encode whatever it wants into the nonzero bits (the linear metadata packs
//! `offset + 1`, see `metadata::linear`). Callers must treat the value as
//! opaque.

use std::fmt;
use std::num::NonZeroU64;

/// An opaque handle into a block's metadata, returned by `BlockMetadata::alloc`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocHandle(Option<NonZeroU64>);

impl AllocHandle {
    /// The invalid handle, equivalent to the raw value `0`.
    pub const INVALID: AllocHandle = AllocHandle(None);

    /// Wrap a raw metadata-private value. `0` collapses to `INVALID`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(NonZeroU64::new(raw))
    }

    /// Recover the raw metadata-private value, `0` for `INVALID`.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0.map_or(0, NonZeroU64::get)
    }

    /// True if this handle is not `INVALID`.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0.is_some()
    }
}

impl Default for AllocHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for AllocHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocHandle({:#x})", self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        assert_eq!(AllocHandle::from_raw(0), AllocHandle::INVALID);
        assert!(!AllocHandle::INVALID.is_valid());
    }

    #[test]
    fn nonzero_roundtrips() {
        let h = AllocHandle::from_raw(42);
        assert!(h.is_valid());
        assert_eq!(h.raw(), 42);
    }
}
