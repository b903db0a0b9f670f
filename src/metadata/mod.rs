//! Block-metadata contract: the suballocation engine that
//! turns one device heap into many correctly aligned ranges.
//!
//! Two variants ship: [`linear::BlockMetadataLinear`] (append-only,
//! ring-buffer, double-stack, upper-address) and
//! [`general::BlockMetadataGeneral`] (TLSF-style segregated free list,
//! supporting all three placement strategies and defragmentation
//! enumeration). Both implement [`BlockMetadata`].

pub mod general;
pub mod linear;

use crate::flags::AllocationStrategy;
use crate::handle::AllocHandle;

/// What a live suballocation represents, carried purely for statistics and
/// JSON dump purposes (the metadata never interprets it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuballocationType {
    Free,
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

/// One entry in a metadata's allocation/free-range map, as surfaced by
/// enumeration and JSON dump.
#[derive(Debug, Clone, Copy)]
pub struct Suballocation {
    pub offset: u64,
    pub size: u64,
    pub ty: SuballocationType,
    pub handle: AllocHandle,
}

/// An opaque, metadata-private plan produced by `create_allocation_request`
/// and later consumed by `alloc`. Carrying it across to `alloc` must not
/// require recomputation — `create_allocation_request` is pure planning.
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest {
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) algorithm_data: AlgorithmData,
}

/// Variant-private bookkeeping threaded from planning to commit. Public so
/// that `block_vector` can pick the tightest candidate across blocks
/// without downcasting, but its fields are not meant to be interpreted by
/// callers outside this crate.
#[derive(Debug, Clone, Copy)]
pub enum AlgorithmData {
    Linear(linear::LinearAllocRequest),
    General,
}

/// Aggregate, non-fallible statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub block_count: u64,
    pub allocation_count: u64,
    pub block_bytes: u64,
    pub allocation_bytes: u64,
}

impl Statistics {
    pub fn fold(&mut self, other: &Statistics) {
        self.block_count += other.block_count;
        self.allocation_count += other.allocation_count;
        self.block_bytes += other.block_bytes;
        self.allocation_bytes += other.allocation_bytes;
    }
}

/// Detailed statistics, folded with
/// min/max identities `(u64::MAX, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailedStatistics {
    pub stats: Statistics,
    pub unused_range_count: u64,
    pub allocation_size_min: u64,
    pub allocation_size_max: u64,
    pub unused_range_size_min: u64,
    pub unused_range_size_max: u64,
}

impl Default for DetailedStatistics {
    fn default() -> Self {
        Self {
            stats: Statistics::default(),
            unused_range_count: 0,
            allocation_size_min: u64::MAX,
            allocation_size_max: 0,
            unused_range_size_min: u64::MAX,
            unused_range_size_max: 0,
        }
    }
}

impl DetailedStatistics {
    pub fn add_allocation(&mut self, size: u64) {
        self.stats.allocation_count += 1;
        self.stats.allocation_bytes += size;
        self.allocation_size_min = self.allocation_size_min.min(size);
        self.allocation_size_max = self.allocation_size_max.max(size);
    }

    pub fn add_unused_range(&mut self, size: u64) {
        self.unused_range_count += 1;
        self.unused_range_size_min = self.unused_range_size_min.min(size);
        self.unused_range_size_max = self.unused_range_size_max.max(size);
    }

    pub fn fold(&mut self, other: &DetailedStatistics) {
        self.stats.fold(&other.stats);
        self.unused_range_count += other.unused_range_count;
        self.allocation_size_min = self.allocation_size_min.min(other.allocation_size_min);
        self.allocation_size_max = self.allocation_size_max.max(other.allocation_size_max);
        self.unused_range_size_min = self.unused_range_size_min.min(other.unused_range_size_min);
        self.unused_range_size_max = self.unused_range_size_max.max(other.unused_range_size_max);
    }
}

/// The full metadata contract every variant must implement.
pub trait BlockMetadata {
    /// Declared total capacity in bytes.
    fn size(&self) -> u64;

    /// Bytes not currently backing a live suballocation.
    fn sum_free_size(&self) -> u64;

    fn allocation_count(&self) -> usize;

    /// Number of distinct free ranges. Linear metadata reports this via a
    /// hard assertion — it does not track free regions as discrete ranges.
    fn free_regions_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.allocation_count() == 0
    }

    fn is_virtual(&self) -> bool;

    fn allocation_offset(&self, handle: AllocHandle) -> u64;

    fn allocation_info(&self, handle: AllocHandle) -> Option<Suballocation>;

    /// Pure planning: does not mutate state. `upper_address` requests
    /// placement from the top of the block (only meaningful to variants
    /// that support it).
    fn create_allocation_request(
        &self,
        size: u64,
        alignment: u64,
        upper_address: bool,
        strategy: AllocationStrategy,
    ) -> Option<AllocationRequest>;

    /// Commit a request produced by `create_allocation_request` against
    /// this same instance with no intervening mutation. Returns the handle
    /// to the new suballocation.
    fn alloc(&mut self, request: AllocationRequest, ty: SuballocationType, private_data: u64) -> AllocHandle;

    fn free(&mut self, handle: AllocHandle);

    fn clear(&mut self);

    /// Validate all internal invariants; used by tests and by debug builds
    /// after mutating operations.
    fn validate(&self) -> bool;

    /// Start enumerating the metadata's suballocation map (allocations and
    /// free ranges) for defragmentation or JSON dump. Variants that don't
    /// support defragmentation enumeration (linear) panic.
    fn begin_alloc_enum(&self) -> Vec<Suballocation>;

    /// Enumerate every suballocation (free and live) in offset order, for
    /// statistics and JSON dump. Unlike `begin_alloc_enum`, every variant
    /// supports this call — it doesn't require the stable per-allocation
    /// index that defragmentation needs, only an offset-ordered walk.
    fn enumerate_suballocations(&self) -> Vec<Suballocation> {
        self.begin_alloc_enum()
    }

    fn allocation_private_data(&self, handle: AllocHandle) -> u64;

    fn set_allocation_private_data(&mut self, handle: AllocHandle, private_data: u64);

    fn add_statistics(&self, stats: &mut Statistics) {
        stats.block_count += 1;
        stats.block_bytes += self.size();
        stats.allocation_count += self.allocation_count() as u64;
        stats.allocation_bytes += self.size() - self.sum_free_size();
    }

    fn add_detailed_statistics(&self, stats: &mut DetailedStatistics) {
        for sub in self.begin_alloc_enum() {
            match sub.ty {
                SuballocationType::Free => stats.add_unused_range(sub.size),
                _ => stats.add_allocation(sub.size),
            }
        }
        stats.stats.block_count += 1;
        stats.stats.block_bytes += self.size();
    }

    /// Whether this variant supports defragmentation move enumeration.
    fn supports_defragmentation(&self) -> bool;
}
