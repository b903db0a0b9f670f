//! Allocation record: the user-visible handle over a committed, placed, or
//! heap-only allocation.
//!
//! A tagged union with a shared header, as the design notes prescribe — an
//! enum rather than a class hierarchy, since Rust's sum types let
//! `ReleaseThis`-equivalent cleanup dispatch on the case without any vtable.
//! Only the heap-only case owns a device object directly (`Box<dyn
//! DeviceHeap>`): a committed allocation's resource is returned straight to
//! the caller by `Allocator::create_resource`, which is the only thing that
//! needs to keep it alive, so the record itself just tracks the bookkeeping
//! id used to fold it into budget and statistics.

use crate::handle::AllocHandle;
use crate::metadata::SuballocationType;
use crate::rhi::{DeviceHeap, HeapType};

/// Bit-packed resource metadata inspected by statistics dumpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedData {
    resource_dimension: u8,
    resource_flags: u32,
    texture_layout: u16,
}

impl PackedData {
    pub fn new(resource_dimension: u8, resource_flags: u32, texture_layout: u16) -> Self {
        debug_assert!(resource_dimension < (1 << 3));
        debug_assert!(resource_flags < (1 << 24));
        debug_assert!(texture_layout < (1 << 9));
        Self { resource_dimension, resource_flags, texture_layout }
    }

    pub fn resource_dimension(&self) -> u8 {
        self.resource_dimension
    }

    pub fn resource_flags(&self) -> u32 {
        self.resource_flags
    }

    pub fn texture_layout(&self) -> u16 {
        self.texture_layout
    }
}

/// Which block a placed allocation lives in — an opaque key the owning
/// block vector uses to route `Free` back to the right block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// The tagged union over the three kinds of allocation the allocator can
/// hand back.
#[derive(Debug)]
pub enum AllocationCase {
    /// A resource with its own dedicated memory (the `CreateResource`
    /// committed path). The resource itself was already handed to the
    /// caller; `committed_id` is only a bookkeeping key into the
    /// allocator's committed-allocation list.
    Committed { committed_id: u64 },
    /// A range inside a shared block. The block vector owns the block's
    /// heap; this case only needs the key to route `Free` back to it.
    Placed { block: BlockId, handle: AllocHandle },
    /// A dedicated heap with no resource (the `AllocateMemory` path). The
    /// allocation is the only handle the caller gets back, so it owns the
    /// heap directly and releases it on drop.
    Heap { heap: Box<dyn DeviceHeap>, committed_id: u64 },
}

/// One user-visible allocation record.
#[derive(Debug)]
pub struct Allocation {
    pub size: u64,
    pub alignment: u64,
    pub offset: u64,
    pub case: AllocationCase,
    pub private_data: u64,
    pub name: Option<String>,
    pub packed: PackedData,
    pub suballocation_type: SuballocationType,
    pub heap_type: HeapType,
    /// Which custom pool owns this allocation, if any. `None` means it came
    /// from one of the allocator's default, heap-type-keyed pools, or is a
    /// committed/heap-only allocation (custom pools only suballocate; see
    /// DESIGN.md).
    pub pool: Option<usize>,
}

impl Allocation {
    pub fn new_placed(size: u64, alignment: u64, offset: u64, block: BlockId, handle: AllocHandle, heap_type: HeapType) -> Self {
        Self {
            size,
            alignment,
            offset,
            case: AllocationCase::Placed { block, handle },
            private_data: 0,
            name: None,
            packed: PackedData::default(),
            suballocation_type: SuballocationType::Unknown,
            heap_type,
            pool: None,
        }
    }

    pub fn new_committed(size: u64, alignment: u64, committed_id: u64, heap_type: HeapType) -> Self {
        Self {
            size,
            alignment,
            offset: 0,
            case: AllocationCase::Committed { committed_id },
            private_data: 0,
            name: None,
            packed: PackedData::default(),
            suballocation_type: SuballocationType::Unknown,
            heap_type,
            pool: None,
        }
    }

    pub fn new_heap(size: u64, alignment: u64, heap: Box<dyn DeviceHeap>, committed_id: u64, heap_type: HeapType) -> Self {
        Self {
            size,
            alignment,
            offset: 0,
            case: AllocationCase::Heap { heap, committed_id },
            private_data: 0,
            name: None,
            packed: PackedData::default(),
            suballocation_type: SuballocationType::Unknown,
            heap_type,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: usize) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn is_placed(&self) -> bool {
        matches!(self.case, AllocationCase::Placed { .. })
    }

    /// Attach a debug name. The record owns this copy and drops it with the
    /// allocation — no separate free path is needed in Rust.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_data_roundtrips_within_bit_widths() {
        let p = PackedData::new(5, 0xABCDEF, 300);
        assert_eq!(p.resource_dimension(), 5);
        assert_eq!(p.resource_flags(), 0xABCDEF);
        assert_eq!(p.texture_layout(), 300);
    }

    #[test]
    fn committed_allocation_has_no_block_link() {
        let a = Allocation::new_committed(1024, 256, 7, HeapType::Default);
        assert!(!a.is_placed());
    }

    #[test]
    fn heap_only_allocation_owns_its_heap() {
        use crate::rhi::dummy::DummyRhi;
        use crate::rhi::{DeviceHeap, Rhi};
        let rhi = DummyRhi::new(1 << 20, 1 << 20);
        let heap: Box<dyn DeviceHeap> = Box::new(rhi.create_heap(4096, HeapType::Default).unwrap());
        let a = Allocation::new_heap(4096, 256, heap, 3, HeapType::Default);
        assert!(!a.is_placed());
    }
}
