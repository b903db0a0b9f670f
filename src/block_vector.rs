//! A block vector: one growable set of same-algorithm, same-heap-type
//! normal blocks behind a single lock.
//!
//! Iterates existing blocks for a fit, grows geometrically when none fits,
//! and retires emptied blocks down to a floor. Uses a single coarse lock
//! per vector rather than finer-grained per-block locks, since only one
//! lock per block vector is needed here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocation::BlockId;
use crate::block::{new_metadata, Algorithm, NormalBlock};
use crate::budget::BudgetTracker;
use crate::error::{AllocError, Result};
use crate::flags::{AllocationFlags, AllocationStrategy};
use crate::handle::AllocHandle;
use crate::metadata::SuballocationType;
use crate::rhi::{HeapType, Rhi};
use crate::sync::Mutex;

/// Doublings of the preferred block size a vector will grow through before
/// new blocks settle at a fixed ceiling size.
const NEW_BLOCK_SIZE_SHIFT_MAX: u32 = 3;

/// Where a successful `allocate` landed: which block, which handle inside
/// that block's metadata, and the resulting byte offset.
#[derive(Debug, Clone, Copy)]
pub struct AllocationPlacement {
    pub block: BlockId,
    pub handle: AllocHandle,
    pub offset: u64,
}

/// Construction parameters for a [`BlockVector`], mirroring the subset of
/// `PoolDesc`/`AllocatorDesc` a vector actually needs.
pub struct BlockVectorParams {
    pub heap_type: HeapType,
    pub preferred_block_size: u64,
    pub min_block_count: u32,
    pub max_block_count: u32,
    pub min_allocation_alignment: u64,
    pub algorithm: Algorithm,
    /// When set, every new block is created at exactly `preferred_block_size`
    /// (rounded up to fit the first request) instead of growing
    /// geometrically — the fixed-size-block pool configuration.
    pub explicit_block_size: bool,
}

pub struct BlockVector<R: Rhi> {
    rhi: Arc<R>,
    params: BlockVectorParams,
    next_block_id: AtomicU64,
    blocks: Mutex<Vec<NormalBlock<R>>>,
}

impl<R: Rhi> BlockVector<R> {
    pub fn new(rhi: Arc<R>, params: BlockVectorParams) -> Self {
        Self { rhi, params, next_block_id: AtomicU64::new(1), blocks: Mutex::new(Vec::new()) }
    }

    pub fn heap_type(&self) -> HeapType {
        self.params.heap_type
    }

    pub fn block_count(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().iter().all(|b| b.is_empty())
    }

    fn next_block_size(&self, requested: u64, existing_block_count: usize) -> u64 {
        if self.params.explicit_block_size {
            return self.params.preferred_block_size.max(requested);
        }
        let shift = (existing_block_count as u32).min(NEW_BLOCK_SIZE_SHIFT_MAX);
        self.params.preferred_block_size.saturating_mul(1u64 << shift).max(requested)
    }

    /// Suballocate `size` bytes from an existing block, or grow the vector
    /// with a freshly created one.
    pub fn allocate(
        &self,
        size: u64,
        alignment: u64,
        flags: AllocationFlags,
        ty: SuballocationType,
        private_data: u64,
        budget: &BudgetTracker,
    ) -> Result<AllocationPlacement> {
        if size == 0 || alignment == 0 {
            return Err(AllocError::InvalidArgument("size and alignment must be nonzero"));
        }
        let effective_alignment = alignment.max(self.params.min_allocation_alignment).max(1);
        let upper_address = flags.contains(AllocationFlags::UPPER_ADDRESS);
        let strategy = AllocationStrategy::from_flags(flags);
        let within_budget = flags.contains(AllocationFlags::WITHIN_BUDGET);

        if within_budget && !budget.can_commit(self.params.heap_type, size) {
            return Err(AllocError::WithinBudgetExceeded);
        }

        let mut blocks = self.blocks.lock();

        let mut best: Option<(usize, crate::metadata::AllocationRequest, u64)> = None;
        for (i, block) in blocks.iter().enumerate() {
            let Some(req) = block.metadata.create_allocation_request(size, effective_alignment, upper_address, strategy)
            else {
                continue;
            };
            match strategy {
                AllocationStrategy::MinTime => {
                    best = Some((i, req, 0));
                    break;
                }
                _ => {
                    // Tightest-fitting block, as a proxy for least wasted space:
                    // the metadata itself already picked the tightest hole
                    // within the block.
                    let waste = block.metadata.sum_free_size();
                    if best.as_ref().map_or(true, |(_, _, w)| waste < *w) {
                        best = Some((i, req, waste));
                    }
                }
            }
        }

        if let Some((i, req, _)) = best {
            let handle = blocks[i].metadata.alloc(req, ty, private_data);
            let offset = blocks[i].metadata.allocation_offset(handle);
            let block_id = blocks[i].id();
            drop(blocks);
            budget.record_commit(self.params.heap_type, size);
            return Ok(AllocationPlacement { block: BlockId(block_id as usize), handle, offset });
        }

        if flags.contains(AllocationFlags::NEVER_ALLOCATE) {
            return Err(AllocError::OutOfDeviceMemory);
        }

        let max_block_count = if self.params.max_block_count == 0 { u32::MAX } else { self.params.max_block_count };
        if blocks.len() as u32 >= max_block_count {
            return Err(AllocError::OutOfDeviceMemory);
        }

        let new_block_size = self.next_block_size(size, blocks.len());
        let heap = self.rhi.create_heap(new_block_size, self.params.heap_type)?;
        let id = self.next_block_id.fetch_add(1, Ordering::Relaxed);
        let metadata = new_metadata(self.params.algorithm, new_block_size, false);
        let mut block = NormalBlock::new(heap, metadata, id);

        let req = block
            .metadata
            .create_allocation_request(size, effective_alignment, upper_address, strategy)
            .ok_or(AllocError::InvalidArgument("requested size does not fit even a freshly created block"))?;
        let handle = block.metadata.alloc(req, ty, private_data);
        let offset = block.metadata.allocation_offset(handle);
        blocks.push(block);
        drop(blocks);

        budget.record_block_created(self.params.heap_type, new_block_size);
        budget.record_commit(self.params.heap_type, size);

        Ok(AllocationPlacement { block: BlockId(id as usize), handle, offset })
    }

    /// Release a placed allocation and retire any block left empty, down to
    /// `min_block_count` (never destroying the last remaining block).
    pub fn free(&self, placement_block: BlockId, handle: AllocHandle, size: u64, budget: &BudgetTracker) {
        let mut blocks = self.blocks.lock();
        if let Some(idx) = blocks.iter().position(|b| b.id() as usize == placement_block.0) {
            blocks[idx].metadata.free(handle);
            budget.record_free(self.params.heap_type, size);
        }
        self.retire_empty_blocks(&mut blocks, budget);
    }

    fn retire_empty_blocks(&self, blocks: &mut Vec<NormalBlock<R>>, budget: &BudgetTracker) {
        let min_keep = self.params.min_block_count.max(1) as usize;
        let mut i = 0;
        while i < blocks.len() {
            if blocks.len() <= min_keep {
                break;
            }
            if blocks[i].is_empty() {
                let removed = blocks.remove(i);
                budget.record_block_destroyed(self.params.heap_type, removed.capacity());
            } else {
                i += 1;
            }
        }
    }

    pub fn allocation_offset(&self, block: BlockId, handle: AllocHandle) -> Option<u64> {
        let blocks = self.blocks.lock();
        blocks.iter().find(|b| b.id() as usize == block.0).map(|b| b.metadata.allocation_offset(handle))
    }

    /// Borrow the device heap backing `block`, for creating a resource over
    /// a placed allocation (`create_placed`/`create_aliasing`). Scoped to a
    /// callback since the block vector's lock must stay held for the
    /// borrow's duration.
    pub fn with_heap<T>(&self, block: BlockId, f: impl FnOnce(&R::Heap) -> T) -> Option<T> {
        let blocks = self.blocks.lock();
        blocks.iter().find(|b| b.id() as usize == block.0).map(|b| f(&b.heap))
    }

    pub fn add_statistics(&self, stats: &mut crate::metadata::Statistics) {
        for block in self.blocks.lock().iter() {
            block.metadata.add_statistics(stats);
        }
    }

    pub fn add_detailed_statistics(&self, stats: &mut crate::metadata::DetailedStatistics) {
        for block in self.blocks.lock().iter() {
            block.metadata.add_detailed_statistics(stats);
        }
    }

    /// Every suballocation (free and live) across every block, for the
    /// detailed JSON dump.
    pub fn collect_suballocations(&self) -> Vec<crate::metadata::Suballocation> {
        self.blocks.lock().iter().flat_map(|b| b.metadata.enumerate_suballocations()).collect()
    }

    /// Whether this vector's blocks support defragmentation enumeration —
    /// only the general (TLSF-style) metadata does; linear metadata panics
    /// on `begin_alloc_enum`.
    pub(crate) fn supports_defragmentation(&self) -> bool {
        self.blocks.lock().first().map_or(false, |b| b.metadata.supports_defragmentation())
    }

    /// Plan up to `max_moves` relocations that pack live allocations from
    /// later blocks into free space in earlier blocks, committing each
    /// destination immediately to reserve the space.
    ///
    /// `fast`, set from `DefragmentationFlags::ALGORITHM_FAST`, stops after
    /// the single tail-most block that yields at least one move instead of
    /// scanning every later block this pass — fewer candidates considered
    /// per pass, trading thoroughness for speed, matching how *fast*
    /// targets one heavy tail block at a time rather than compacting
    /// broadly like *full*.
    pub(crate) fn plan_moves(&self, max_moves: usize, fast: bool, budget: &BudgetTracker) -> Vec<PlannedMove> {
        let mut blocks = self.blocks.lock();
        let mut planned = Vec::new();
        if max_moves == 0 || blocks.len() < 2 || !blocks[0].metadata.supports_defragmentation() {
            return planned;
        }
        'outer: for src_idx in (1..blocks.len()).rev() {
            let live: Vec<_> =
                blocks[src_idx].metadata.begin_alloc_enum().into_iter().filter(|s| s.ty != SuballocationType::Free).collect();
            let moves_before_this_block = planned.len();
            for sub in live {
                for dst_idx in 0..src_idx {
                    let Some(req) =
                        blocks[dst_idx].metadata.create_allocation_request(sub.size, 1, false, AllocationStrategy::MinOffset)
                    else {
                        continue;
                    };
                    let dst_handle = blocks[dst_idx].metadata.alloc(req, sub.ty, 0);
                    let dst_offset = blocks[dst_idx].metadata.allocation_offset(dst_handle);
                    let dst_block_id = blocks[dst_idx].id();
                    budget.record_commit(self.params.heap_type, sub.size);
                    planned.push(PlannedMove {
                        src_block: BlockId(blocks[src_idx].id() as usize),
                        src_handle: sub.handle,
                        size: sub.size,
                        dst_block: BlockId(dst_block_id as usize),
                        dst_handle,
                        dst_offset,
                    });
                    if planned.len() >= max_moves {
                        break 'outer;
                    }
                    break;
                }
            }
            if fast && planned.len() > moves_before_this_block {
                break;
            }
        }
        planned
    }

    /// Apply the caller's resolution for a previously planned move.
    pub(crate) fn resolve_move(&self, mv: &PlannedMove, resolution: MoveResolution, budget: &BudgetTracker) {
        let mut blocks = self.blocks.lock();
        let free_at = |blocks: &mut Vec<NormalBlock<R>>, block: BlockId, handle: AllocHandle| {
            if let Some(idx) = blocks.iter().position(|b| b.id() as usize == block.0) {
                blocks[idx].metadata.free(handle);
            }
        };
        match resolution {
            MoveResolution::Copy => {
                free_at(&mut blocks, mv.src_block, mv.src_handle);
                budget.record_free(self.params.heap_type, mv.size);
            }
            MoveResolution::Ignore => {
                free_at(&mut blocks, mv.dst_block, mv.dst_handle);
                budget.record_free(self.params.heap_type, mv.size);
            }
            MoveResolution::Destroy => {
                free_at(&mut blocks, mv.src_block, mv.src_handle);
                free_at(&mut blocks, mv.dst_block, mv.dst_handle);
                budget.record_free(self.params.heap_type, mv.size * 2);
            }
        }
        self.retire_empty_blocks(&mut blocks, budget);
    }
}

/// One relocation planned by [`BlockVector::plan_moves`] and carried through
/// to [`BlockVector::resolve_move`].
#[derive(Debug, Clone, Copy)]
pub struct PlannedMove {
    pub src_block: BlockId,
    pub src_handle: AllocHandle,
    pub size: u64,
    pub dst_block: BlockId,
    pub dst_handle: AllocHandle,
    pub dst_offset: u64,
}

/// The caller's resolution for one planned move: copy, ignore, or destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResolution {
    /// The data was copied to the new location; free the old one.
    Copy,
    /// The move was not performed; release the reserved destination.
    Ignore,
    /// The allocation is being destroyed outright; release both locations.
    Destroy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::dummy::DummyRhi;

    fn vector(rhi: Arc<DummyRhi>, preferred: u64, min: u32, max: u32) -> BlockVector<DummyRhi> {
        BlockVector::new(
            rhi,
            BlockVectorParams {
                heap_type: HeapType::Default,
                preferred_block_size: preferred,
                min_block_count: min,
                max_block_count: max,
                min_allocation_alignment: 1,
                algorithm: Algorithm::General,
                explicit_block_size: false,
            },
        )
    }

    #[test]
    fn first_allocation_creates_a_block() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 1024, 0, 0);
        let placement = vec.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        assert_eq!(placement.offset, 0);
        assert_eq!(vec.block_count(), 1);
    }

    #[test]
    fn growth_creates_additional_blocks_when_full() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 256, 0, 0);
        let _a = vec.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        // The first block is now full; this must land in a second block.
        let placement = vec.allocate(64, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        assert_eq!(placement.offset, 0);
        assert_eq!(vec.block_count(), 2);
    }

    #[test]
    fn never_allocate_fails_without_growing() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 256, 0, 0);
        let _a = vec.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let err = vec
            .allocate(64, 16, AllocationFlags::NEVER_ALLOCATE, SuballocationType::Buffer, 0, &budget)
            .unwrap_err();
        assert!(matches!(err, AllocError::OutOfDeviceMemory));
        assert_eq!(vec.block_count(), 1);
    }

    #[test]
    fn max_block_count_is_enforced() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 256, 0, 1);
        let _a = vec.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let err = vec.allocate(64, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap_err();
        assert!(matches!(err, AllocError::OutOfDeviceMemory));
    }

    #[test]
    fn freeing_retires_empty_blocks_above_min_count() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 256, 1, 0);
        let a = vec.allocate(256, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let b = vec.allocate(64, 16, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        assert_eq!(vec.block_count(), 2);
        vec.free(a.block, a.handle, 256, &budget);
        // First block is now empty but min_block_count keeps exactly one.
        assert_eq!(vec.block_count(), 1);
        vec.free(b.block, b.handle, 64, &budget);
        assert_eq!(vec.block_count(), 1);
    }

    #[test]
    fn fast_defrag_plans_fewer_moves_than_a_full_scan() {
        let rhi = Arc::new(DummyRhi::new(1 << 30, 1 << 30));
        let budget = BudgetTracker::new();
        let vec = vector(rhi, 256, 3, 0);
        let a = vec.allocate(256, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let _b = vec.allocate(128, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let _c = vec.allocate(128, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let _d = vec.allocate(64, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        vec.free(a.block, a.handle, 256, &budget);
        assert_eq!(vec.block_count(), 3);

        let fast_moves = vec.plan_moves(10, true, &budget);
        assert_eq!(fast_moves.len(), 1, "fast mode should stop after the single tail-most block it can empty");

        for mv in &fast_moves {
            vec.resolve_move(mv, MoveResolution::Ignore, &budget);
        }

        let full_moves = vec.plan_moves(10, false, &budget);
        assert_eq!(full_moves.len(), 2, "a full scan should also pull the earlier block's movable allocation");
    }
}
