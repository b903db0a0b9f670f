//! The graphics-device collaborator the allocator drives.
//!
//! `gpuma` never owns a concrete device/queue/command-list abstraction —
//! that is explicitly out of scope. Instead the
//! allocator is generic over (or boxes) an `Rhi` implementation that knows
//! how to create/destroy heaps and resources on a real or simulated device.

pub mod dummy;
#[cfg(feature = "gpu-vulkan")]
pub mod vulkan;

use crate::error::Result;

/// Which of the device's memory heaps an allocation should land in, matching
/// the original's `D3D12_HEAP_TYPE`-shaped distinction between device-local,
/// upload, and readback memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeapType {
    #[default]
    Default,
    Upload,
    Readback,
    Custom(u32),
}

/// Which of the two budget-tracked segment groups a heap
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySegmentGroup {
    Local,
    NonLocal,
}

/// What kind of resource a placed/committed allocation backs, used only to
/// validate that resources requiring dedicated alignment (MSAA targets) are
/// routed to committed allocations when the Rhi demands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Buffer,
    SmallTexture,
    NonSmallTexture,
    RtDsTexture,
}

/// Minimal description of the resource to create, intentionally RHI-opaque:
/// a size/alignment pair plus the class the Rhi needs to select its
/// low-level creation path.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDesc {
    pub size: u64,
    pub alignment: u64,
    pub class: ResourceClass,
    pub heap_type: HeapType,
}

/// Opaque handle to a protected-content session (the original's
/// `ID3D12ProtectedResourceSession`), carried on a pool purely as
/// bookkeeping — the allocator threads it through to `create_heap` calls it
/// issues for that pool's blocks but never interprets the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectedSessionHandle(pub u64);

/// Opaque device-owned heap handle (the backing store a block suballocates
/// from, or the memory behind a committed allocation).
pub trait DeviceHeap: Send + Sync + std::fmt::Debug {
    fn size(&self) -> u64;
}

/// Opaque device-owned resource handle (what an allocation ultimately
/// points at on the device).
pub trait DeviceResource: Send + Sync + std::fmt::Debug {}

/// Capability flags the allocator consults for policy decisions, carried
/// forward from the original's `IsUMA`/`IsCacheCoherentUMA`/
/// `IsGPUUploadHeapSupported`/`IsTightAlignmentSupported` queries
///.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocatorCaps {
    pub is_uma: bool,
    pub is_cache_coherent_uma: bool,
    pub is_gpu_upload_heap_supported: bool,
    pub is_tight_alignment_supported: bool,
}

/// The collaborator the allocator drives to create heaps and resources.
///
/// Implementations are expected to be cheap to clone (an `Arc` wrapper
/// around a real device, or the whole state for `DummyRhi`).
pub trait Rhi: Send + Sync {
    type Heap: DeviceHeap;
    type Resource: DeviceResource;

    /// Allocate a raw device heap of at least `size` bytes for `heap_type`.
    fn create_heap(&self, size: u64, heap_type: HeapType) -> Result<Self::Heap>;

    /// Place a resource at `offset` within an existing heap.
    fn create_placed(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource>;

    /// Create a resource with its own dedicated (committed) memory.
    fn create_committed(&self, desc: &ResourceDesc) -> Result<Self::Resource>;

    /// Create a resource aliasing the memory of an existing placed resource.
    fn create_aliasing(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource>;

    /// Total and currently-used bytes for `group`, used to refresh the
    /// budget tracker.
    fn query_memory_capacity(&self, group: MemorySegmentGroup) -> (u64, u64);

    /// Queried small-resource placement alignment, used only when the
    /// `small-alignment-query` feature selects placement mode 2.
    fn query_small_alignment(&self, _class: ResourceClass) -> Option<u64> {
        None
    }

    fn caps(&self) -> AllocatorCaps {
        AllocatorCaps::default()
    }
}
