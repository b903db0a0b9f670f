//! In-process Rhi simulator.
//!
//! A backend that hands out inert handles and tracks byte counts so the
//! allocator's own logic can be exercised (and the `demos/` examples run)
//! without a real GPU. Heaps are simulated with a host-memory `Vec<u8>`
//! buffer; resources are just tagged records — no bytes are actually
//! mapped to them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{AllocError, Result};
use crate::rhi::{AllocatorCaps, DeviceHeap, DeviceResource, HeapType, MemorySegmentGroup, ResourceDesc, Rhi};

/// A simulated device heap: just a size and an id, backed by nothing.
#[derive(Debug)]
pub struct DummyHeap {
    id: u64,
    size: u64,
}

impl DeviceHeap for DummyHeap {
    fn size(&self) -> u64 {
        self.size
    }
}

/// A simulated resource.
#[derive(Debug)]
pub struct DummyResource {
    #[allow(dead_code)]
    id: u64,
}

impl DeviceResource for DummyResource {}

/// An in-process Rhi that simulates a device with a fixed memory capacity
/// per segment group, useful for tests and for running the crate's demos
/// without a GPU.
pub struct DummyRhi {
    next_id: AtomicU64,
    local_capacity: u64,
    local_used: AtomicU64,
    non_local_capacity: u64,
    non_local_used: AtomicU64,
    fail_next_heap: Mutex<bool>,
}

impl DummyRhi {
    pub fn new(local_capacity: u64, non_local_capacity: u64) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            local_capacity,
            local_used: AtomicU64::new(0),
            non_local_capacity,
            non_local_used: AtomicU64::new(0),
            fail_next_heap: Mutex::new(false),
        }
    }

    /// Force the next `create_heap` call to fail with `OutOfDeviceMemory`,
    /// used to exercise committed-allocation fallback paths in tests.
    pub fn fail_next_heap(&self) {
        *self.fail_next_heap.lock().unwrap() = true;
    }

    fn segment_for(&self, heap_type: HeapType) -> MemorySegmentGroup {
        match heap_type {
            HeapType::Default => MemorySegmentGroup::Local,
            _ => MemorySegmentGroup::NonLocal,
        }
    }
}

impl Rhi for DummyRhi {
    type Heap = DummyHeap;
    type Resource = DummyResource;

    fn create_heap(&self, size: u64, heap_type: HeapType) -> Result<Self::Heap> {
        if std::mem::replace(&mut *self.fail_next_heap.lock().unwrap(), false) {
            return Err(AllocError::OutOfDeviceMemory);
        }
        let (used, capacity) = match self.segment_for(heap_type) {
            MemorySegmentGroup::Local => (&self.local_used, self.local_capacity),
            MemorySegmentGroup::NonLocal => (&self.non_local_used, self.non_local_capacity),
        };
        let prev = used.fetch_add(size, Ordering::SeqCst);
        if prev + size > capacity {
            used.fetch_sub(size, Ordering::SeqCst);
            return Err(AllocError::OutOfDeviceMemory);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        log::debug!("dummy rhi: created heap {id} ({size} bytes, {heap_type:?})");
        Ok(DummyHeap { id, size })
    }

    fn create_placed(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource> {
        if offset + desc.size > heap.size {
            return Err(AllocError::InvalidArgument("placed resource exceeds heap bounds"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(DummyResource { id })
    }

    fn create_committed(&self, desc: &ResourceDesc) -> Result<Self::Resource> {
        let (used, capacity) = match self.segment_for(desc.heap_type) {
            MemorySegmentGroup::Local => (&self.local_used, self.local_capacity),
            MemorySegmentGroup::NonLocal => (&self.non_local_used, self.non_local_capacity),
        };
        let prev = used.fetch_add(desc.size, Ordering::SeqCst);
        if prev + desc.size > capacity {
            used.fetch_sub(desc.size, Ordering::SeqCst);
            return Err(AllocError::OutOfDeviceMemory);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        log::debug!("dummy rhi: committed resource {id} ({} bytes)", desc.size);
        Ok(DummyResource { id })
    }

    fn create_aliasing(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource> {
        self.create_placed(heap, offset, desc)
    }

    fn query_memory_capacity(&self, group: MemorySegmentGroup) -> (u64, u64) {
        match group {
            MemorySegmentGroup::Local => (self.local_capacity, self.local_used.load(Ordering::SeqCst)),
            MemorySegmentGroup::NonLocal => (self.non_local_capacity, self.non_local_used.load(Ordering::SeqCst)),
        }
    }

    fn caps(&self) -> AllocatorCaps {
        AllocatorCaps {
            is_uma: false,
            is_cache_coherent_uma: false,
            is_gpu_upload_heap_supported: true,
            is_tight_alignment_supported: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::ResourceClass;

    #[test]
    fn create_heap_respects_capacity() {
        let rhi = DummyRhi::new(1024, 1024);
        assert!(rhi.create_heap(512, HeapType::Default).is_ok());
        assert!(rhi.create_heap(512, HeapType::Default).is_ok());
        assert!(matches!(rhi.create_heap(1, HeapType::Default), Err(AllocError::OutOfDeviceMemory)));
    }

    #[test]
    fn fail_next_heap_forces_one_failure() {
        let rhi = DummyRhi::new(1024, 1024);
        rhi.fail_next_heap();
        assert!(matches!(rhi.create_heap(16, HeapType::Default), Err(AllocError::OutOfDeviceMemory)));
        assert!(rhi.create_heap(16, HeapType::Default).is_ok());
    }

    #[test]
    fn placed_resource_checked_against_heap_bounds() {
        let rhi = DummyRhi::new(1024, 1024);
        let heap = rhi.create_heap(256, HeapType::Default).unwrap();
        let desc = ResourceDesc { size: 64, alignment: 16, class: ResourceClass::Buffer, heap_type: HeapType::Default };
        assert!(rhi.create_placed(&heap, 128, &desc).is_ok());
        assert!(rhi.create_placed(&heap, 250, &desc).is_err());
    }
}
