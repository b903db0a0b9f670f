//! Configuration structs: descriptors for the allocator, pools, allocations,
//! and virtual blocks, in a builder-style `with_*` idiom.

use crate::block::Algorithm;
use crate::flags::{AllocationFlags, AllocatorFlags, PoolFlags, VirtualAllocationFlags, VirtualBlockFlags};
use crate::rhi::{HeapType, ProtectedSessionHandle};

/// Residency hint, carried straight from the original's `ResidencyPriority`
/// — ordering matches the source so `>=` comparisons
/// between priorities behave the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ResidencyPriority {
    Minimum,
    Low,
    #[default]
    Normal,
    High,
    Maximum,
}

/// Library default preferred block size: 64 MiB.
pub const DEFAULT_PREFERRED_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Top-level allocator configuration.
#[derive(Clone)]
pub struct AllocatorDesc {
    pub flags: AllocatorFlags,
    pub preferred_block_size: u64,
}

impl Default for AllocatorDesc {
    fn default() -> Self {
        Self { flags: AllocatorFlags::empty(), preferred_block_size: DEFAULT_PREFERRED_BLOCK_SIZE }
    }
}

impl AllocatorDesc {
    pub fn with_flags(mut self, flags: AllocatorFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_preferred_block_size(mut self, size: u64) -> Self {
        self.preferred_block_size = if size == 0 { DEFAULT_PREFERRED_BLOCK_SIZE } else { size };
        self
    }
}

/// Custom pool configuration.
#[derive(Clone)]
pub struct PoolDesc {
    pub flags: PoolFlags,
    pub heap_type: HeapType,
    pub block_size: u64,
    pub min_block_count: u32,
    pub max_block_count: u32,
    pub min_allocation_alignment: u64,
    pub residency_priority: ResidencyPriority,
    pub name: Option<String>,
    /// Protected-content session this pool's blocks should be created
    /// under. Carried through as opaque bookkeeping; see `DESIGN.md` for
    /// why no RHI implementation in this crate interprets it yet.
    pub protected_session: Option<ProtectedSessionHandle>,
}

impl Default for PoolDesc {
    fn default() -> Self {
        Self {
            flags: PoolFlags::empty(),
            heap_type: HeapType::Default,
            block_size: 0,
            min_block_count: 0,
            max_block_count: 0,
            min_allocation_alignment: 1,
            residency_priority: ResidencyPriority::default(),
            name: None,
            protected_session: None,
        }
    }
}

impl PoolDesc {
    pub fn with_heap_type(mut self, heap_type: HeapType) -> Self {
        self.heap_type = heap_type;
        self
    }

    pub fn with_block_size(mut self, size: u64) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_block_count_range(mut self, min: u32, max: u32) -> Self {
        self.min_block_count = min;
        self.max_block_count = max;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_protected_session(mut self, session: ProtectedSessionHandle) -> Self {
        self.protected_session = Some(session);
        self
    }

    pub(crate) fn algorithm(&self) -> Algorithm {
        if self.flags.contains(PoolFlags::ALGORITHM_LINEAR) {
            Algorithm::Linear
        } else {
            Algorithm::General
        }
    }

    /// Validate `block_size` is zero or a power-of-two multiple of the
    /// allocation alignment, and `min <= max` when both are nonzero
    ///.
    pub(crate) fn validate(&self) -> bool {
        let block_size_ok = self.block_size == 0 || self.block_size.is_power_of_two() || self.block_size % self.min_allocation_alignment.max(1) == 0;
        let range_ok = self.min_block_count == 0 || self.max_block_count == 0 || self.min_block_count <= self.max_block_count;
        block_size_ok && range_ok
    }
}

/// Per-allocation request configuration.
#[derive(Clone, Default)]
pub struct AllocationDesc {
    pub flags: AllocationFlags,
    pub heap_type: HeapType,
    pub custom_pool: Option<usize>,
    pub private_data: u64,
}

impl AllocationDesc {
    pub fn with_flags(mut self, flags: AllocationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_heap_type(mut self, heap_type: HeapType) -> Self {
        self.heap_type = heap_type;
        self
    }

    pub fn with_custom_pool(mut self, pool: usize) -> Self {
        self.custom_pool = Some(pool);
        self
    }
}

/// Virtual block configuration.
#[derive(Clone, Default)]
pub struct VirtualBlockDesc {
    pub flags: VirtualBlockFlags,
    pub size: u64,
}

impl VirtualBlockDesc {
    pub fn new(size: u64) -> Self {
        Self { flags: VirtualBlockFlags::empty(), size }
    }

    pub fn with_flags(mut self, flags: VirtualBlockFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn algorithm(&self) -> Algorithm {
        if self.flags.contains(VirtualBlockFlags::ALGORITHM_LINEAR) {
            Algorithm::Linear
        } else {
            Algorithm::General
        }
    }
}

/// Per-allocation configuration for a virtual block.
#[derive(Clone, Copy)]
pub struct VirtualAllocationDesc {
    pub flags: VirtualAllocationFlags,
    pub size: u64,
    pub alignment: u64,
    pub private_data: u64,
}

impl Default for VirtualAllocationDesc {
    fn default() -> Self {
        Self { flags: VirtualAllocationFlags::empty(), size: 0, alignment: 1, private_data: 0 }
    }
}

impl VirtualAllocationDesc {
    pub fn new(size: u64) -> Self {
        Self { size, ..Default::default() }
    }

    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = if alignment == 0 { 1 } else { alignment };
        self
    }

    pub fn with_flags(mut self, flags: VirtualAllocationFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Result of `GetAllocationInfo` on a virtual allocation.
#[derive(Debug, Clone, Copy)]
pub struct VirtualAllocationInfo {
    pub offset: u64,
    pub size: u64,
    pub private_data: u64,
}
