//! User-supplied allocation callbacks for host-side bookkeeping structures.
//!
//! Mirrors the original `AllocationCallbacks` pair of function pointers; Rust
//! callers normally leave this `None` and let the crate use the global
//! allocator, but embedders that track host memory separately from device
//! memory can hook in here.

use std::alloc::Layout;
use std::fmt;
use std::sync::Arc;

/// Host allocate/free hooks, analogous to the original's `pAllocate`/`pFree`.
#[derive(Clone)]
pub struct AllocationCallbacks {
    allocate: Arc<dyn Fn(Layout) -> *mut u8 + Send + Sync>,
    free: Arc<dyn Fn(*mut u8, Layout) + Send + Sync>,
}

impl AllocationCallbacks {
    /// Build a callback pair from plain functions.
    pub fn new(
        allocate: impl Fn(Layout) -> *mut u8 + Send + Sync + 'static,
        free: impl Fn(*mut u8, Layout) + Send + Sync + 'static,
    ) -> Self {
        Self {
            allocate: Arc::new(allocate),
            free: Arc::new(free),
        }
    }

    pub(crate) fn allocate(&self, layout: Layout) -> *mut u8 {
        (self.allocate)(layout)
    }

    pub(crate) fn free(&self, ptr: *mut u8, layout: Layout) {
        (self.free)(ptr, layout)
    }
}

impl fmt::Debug for AllocationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationCallbacks").finish_non_exhaustive()
    }
}

/// A debug-name string, routed through the allocator's [`AllocationCallbacks`]
/// when present (mirroring the original, which allocates a pool/allocation's
/// name buffer via the same `pAllocate`/`pFree` pair as its device-memory
/// bookkeeping) instead of silently falling back to the global allocator.
pub(crate) enum HostString {
    Std(String),
    Custom { ptr: *mut u8, len: usize, callbacks: AllocationCallbacks },
}

impl HostString {
    pub(crate) fn new(s: &str, callbacks: Option<&AllocationCallbacks>) -> Self {
        match callbacks {
            None => HostString::Std(s.to_owned()),
            Some(cb) => {
                let bytes = s.as_bytes();
                let layout = Layout::array::<u8>(bytes.len().max(1)).expect("name too large to lay out");
                let ptr = cb.allocate(layout);
                if !ptr.is_null() && !bytes.is_empty() {
                    unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
                }
                HostString::Custom { ptr, len: bytes.len(), callbacks: cb.clone() }
            }
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            HostString::Std(s) => s.as_str(),
            HostString::Custom { ptr, len, .. } => {
                if ptr.is_null() {
                    ""
                } else {
                    unsafe { std::str::from_utf8_unchecked(std::slice::from_raw_parts(*ptr, *len)) }
                }
            }
        }
    }
}

impl Drop for HostString {
    fn drop(&mut self) {
        if let HostString::Custom { ptr, len, callbacks } = self {
            if !ptr.is_null() {
                let layout = Layout::array::<u8>((*len).max(1)).expect("name too large to lay out");
                callbacks.free(*ptr, layout);
            }
        }
    }
}

// Safety: `Custom`'s raw pointer owns a uniquely-held byte buffer allocated
// through `AllocationCallbacks`, which itself requires `Send + Sync`
// closures; no aliasing access to the pointer is possible from outside
// this type.
unsafe impl Send for HostString {}
unsafe impl Sync for HostString {}

impl fmt::Debug for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

#[cfg(test)]
mod host_string_tests {
    use super::*;

    #[test]
    fn falls_back_to_std_string_without_callbacks() {
        let s = HostString::new("pool-a", None);
        assert_eq!(s.as_str(), "pool-a");
    }

    #[test]
    fn round_trips_through_custom_callbacks() {
        let cb = AllocationCallbacks::new(
            |layout| unsafe { std::alloc::alloc(layout) },
            |ptr, layout| unsafe { std::alloc::dealloc(ptr, layout) },
        );
        let s = HostString::new("custom-pool", Some(&cb));
        assert_eq!(s.as_str(), "custom-pool");
    }

    #[test]
    fn empty_name_round_trips() {
        let cb = AllocationCallbacks::new(
            |layout| unsafe { std::alloc::alloc(layout) },
            |ptr, layout| unsafe { std::alloc::dealloc(ptr, layout) },
        );
        let s = HostString::new("", Some(&cb));
        assert_eq!(s.as_str(), "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invokes_through_arc() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cb = AllocationCallbacks::new(
            move |layout| {
                calls.fetch_add(1, Ordering::SeqCst);
                unsafe { std::alloc::alloc(layout) }
            },
            move |ptr, layout| unsafe { std::alloc::dealloc(ptr, layout) },
        );
        let layout = Layout::from_size_align(16, 8).unwrap();
        let ptr = cb.allocate(layout);
        assert!(!ptr.is_null());
        cb.free(ptr, layout);
        assert_eq!(calls2.load(Ordering::SeqCst), 1);
    }
}
