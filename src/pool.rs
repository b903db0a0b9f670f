//! A custom pool: one block vector plus the committed allocations routed to
//! it.

use std::sync::Arc;

use crate::allocation::{Allocation, AllocationCase};
use crate::block_vector::{BlockVector, BlockVectorParams};
use crate::budget::BudgetTracker;
use crate::callbacks::{AllocationCallbacks, HostString};
use crate::config::PoolDesc;
use crate::error::{AllocError, Result};
use crate::flags::{AllocationFlags, PoolFlags};
use crate::handle::AllocHandle;
use crate::metadata::{DetailedStatistics, Statistics, SuballocationType};
use crate::rhi::{HeapType, Rhi};

/// One custom pool: a dedicated block vector configured independently of the
/// allocator's default pools.
///
/// Custom pools only ever suballocate from their own blocks — committed and
/// heap-only allocations are always served by the allocator's default,
/// heap-type-keyed pools instead, never by a named custom `Pool` (see
/// DESIGN.md). That keeps a pool's contents homogeneous: every `Allocation`
/// it produces is `AllocationCase::Placed`.
pub struct Pool<R: Rhi> {
    name: Option<HostString>,
    heap_type: HeapType,
    flags: PoolFlags,
    block_vector: Arc<BlockVector<R>>,
}

impl<R: Rhi> Pool<R> {
    pub fn new(rhi: Arc<R>, desc: &PoolDesc, callbacks: Option<&AllocationCallbacks>) -> Result<Self> {
        if !desc.validate() {
            return Err(AllocError::InvalidArgument("pool descriptor has an inconsistent block size or block count range"));
        }
        let algorithm = desc.algorithm();
        let preferred_block_size = if desc.block_size != 0 { desc.block_size } else { crate::config::DEFAULT_PREFERRED_BLOCK_SIZE };
        let params = BlockVectorParams {
            heap_type: desc.heap_type,
            preferred_block_size,
            min_block_count: desc.min_block_count,
            max_block_count: desc.max_block_count,
            min_allocation_alignment: desc.min_allocation_alignment.max(1),
            algorithm,
            explicit_block_size: desc.block_size != 0,
        };
        Ok(Self {
            name: desc.name.as_deref().map(|n| HostString::new(n, callbacks)),
            heap_type: desc.heap_type,
            flags: desc.flags,
            block_vector: Arc::new(BlockVector::new(rhi, params)),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(HostString::as_str)
    }

    pub fn heap_type(&self) -> HeapType {
        self.heap_type
    }

    pub fn flags(&self) -> PoolFlags {
        self.flags
    }

    /// Suballocate `size` bytes from this pool's block vector.
    pub fn allocate(
        &self,
        size: u64,
        alignment: u64,
        flags: AllocationFlags,
        ty: SuballocationType,
        private_data: u64,
        budget: &BudgetTracker,
    ) -> Result<Allocation> {
        let placement = self.block_vector.allocate(size, alignment, flags, ty, private_data, budget)?;
        Ok(Allocation::new_placed(size, alignment, placement.offset, placement.block, placement.handle, self.heap_type))
    }

    /// Free a placed allocation this pool produced.
    ///
    /// Panics if handed a committed or heap-only allocation — those never
    /// originate from a `Pool` and must be released through the allocator
    /// that created them instead.
    pub fn free(&self, allocation: &Allocation, budget: &BudgetTracker) {
        match allocation.case {
            AllocationCase::Placed { block, handle } => {
                self.block_vector.free(block, handle, allocation.size, budget);
            }
            AllocationCase::Committed { .. } | AllocationCase::Heap { .. } => {
                unreachable!("custom pools only ever produce placed allocations")
            }
        }
    }

    pub fn block_count(&self) -> usize {
        self.block_vector.block_count()
    }

    /// `Pool::IsEmpty`-equivalent check for `CheckPoolCorruption`-adjacent
    /// diagnostics: true when every block is unused.
    pub fn is_empty(&self) -> bool {
        self.block_vector.is_empty()
    }

    pub fn add_statistics(&self, stats: &mut Statistics) {
        self.block_vector.add_statistics(stats);
    }

    pub fn add_detailed_statistics(&self, stats: &mut DetailedStatistics) {
        self.block_vector.add_detailed_statistics(stats);
    }

    pub fn collect_suballocations(&self) -> Vec<crate::metadata::Suballocation> {
        self.block_vector.collect_suballocations()
    }

    pub(crate) fn block_vector(&self) -> &BlockVector<R> {
        &self.block_vector
    }

    pub(crate) fn with_heap<T>(&self, block: crate::allocation::BlockId, f: impl FnOnce(&R::Heap) -> T) -> Option<T> {
        self.block_vector.with_heap(block, f)
    }

    pub(crate) fn block_vector_arc(&self) -> Arc<BlockVector<R>> {
        self.block_vector.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::dummy::DummyRhi;

    #[test]
    fn pool_allocates_and_frees() {
        let rhi = Arc::new(DummyRhi::new(1 << 20, 1 << 20));
        let desc = PoolDesc::default().with_block_size(1024);
        let pool = Pool::new(rhi, &desc, None).unwrap();
        let budget = BudgetTracker::new();
        let alloc = pool.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        assert!(alloc.is_placed());
        pool.free(&alloc, &budget);
        assert!(pool.is_empty());
    }

    #[test]
    fn invalid_block_count_range_is_rejected() {
        let rhi = Arc::new(DummyRhi::new(1 << 20, 1 << 20));
        let desc = PoolDesc::default().with_block_count_range(4, 2);
        assert!(Pool::new(rhi, &desc, None).is_err());
    }
}
