//! Incremental defragmentation: `BeginPass`/`EndPass` over a pool's block
//! vector.
//!
//! Only general (TLSF-style) metadata supports the enumeration this needs;
//! a pool built with `PoolFlags::ALGORITHM_LINEAR` reports no work on every
//! pass.

use std::sync::Arc;

use crate::block_vector::{BlockVector, MoveResolution as BlockMoveResolution, PlannedMove};
use crate::budget::BudgetTracker;
use crate::flags::DefragmentationFlags;
use crate::pool::Pool;
use crate::rhi::Rhi;

/// One relocation the caller must act on: copy `size` bytes from the
/// allocation's old location to `dst_offset` in `dst_block`, then report how
/// it went via [`DefragmentationContext::end_pass`].
#[derive(Debug, Clone, Copy)]
pub struct DefragmentationMove {
    pub(crate) inner: PlannedMove,
    pub size: u64,
    pub dst_offset: u64,
}

/// What happened to one proposed move, reported back through `end_pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOperation {
    /// The caller copied the data; commit the new location.
    Copy,
    /// The caller declined or could not perform the move; keep the old one.
    Ignore,
    /// The caller destroyed the allocation outright; release both slots.
    Destroy,
}

impl From<MoveOperation> for BlockMoveResolution {
    fn from(op: MoveOperation) -> Self {
        match op {
            MoveOperation::Copy => BlockMoveResolution::Copy,
            MoveOperation::Ignore => BlockMoveResolution::Ignore,
            MoveOperation::Destroy => BlockMoveResolution::Destroy,
        }
    }
}

/// Drives one defragmentation run over a single pool's block vector.
///
/// The caller loops: call `begin_pass` for a batch of candidate moves, copy
/// the bytes for each one it accepts (outside this crate's concern — it has
/// no notion of a command list), then call `end_pass` with the resolution
/// for every move it was handed.
pub struct DefragmentationContext<R: Rhi> {
    block_vector: Arc<BlockVector<R>>,
    flags: DefragmentationFlags,
}

impl<R: Rhi> DefragmentationContext<R> {
    pub fn new(pool: &Pool<R>, flags: DefragmentationFlags) -> Self {
        // Pool owns its block vector behind an Arc; a defrag context clones
        // it rather than borrowing with a lifetime that would otherwise pin
        // the pool for the whole defrag run.
        Self { block_vector: pool.block_vector_arc(), flags }
    }

    /// Moves proposed per pass, tuned by `DefragmentationFlags::ALGORITHM_FAST`
    /// (small, cheap batches) vs `ALGORITHM_FULL` (larger batches, more
    /// thorough compaction per pass).
    fn batch_size(&self) -> usize {
        if self.flags.contains(DefragmentationFlags::ALGORITHM_FULL) {
            64
        } else {
            8
        }
    }

    /// Propose the next batch of moves. An empty result means defragmentation
    /// is complete (or this pool's algorithm doesn't support it).
    pub fn begin_pass(&self, budget: &BudgetTracker) -> Vec<DefragmentationMove> {
        let fast = self.flags.contains(DefragmentationFlags::ALGORITHM_FAST);
        self.block_vector
            .plan_moves(self.batch_size(), fast, budget)
            .into_iter()
            .map(|mv| DefragmentationMove { size: mv.size, dst_offset: mv.dst_offset, inner: mv })
            .collect()
    }

    /// Report what happened to every move `begin_pass` returned.
    pub fn end_pass(&self, moves: &[DefragmentationMove], resolutions: &[MoveOperation], budget: &BudgetTracker) {
        debug_assert_eq!(moves.len(), resolutions.len(), "must resolve exactly the moves begin_pass returned");
        for (mv, &op) in moves.iter().zip(resolutions) {
            self.block_vector.resolve_move(&mv.inner, op.into(), budget);
        }
    }

    pub fn supports_defragmentation(&self) -> bool {
        self.block_vector.supports_defragmentation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolDesc;
    use crate::flags::AllocationFlags;
    use crate::metadata::SuballocationType;
    use crate::rhi::dummy::DummyRhi;

    #[test]
    fn compacts_allocation_into_earlier_block() {
        let rhi = Arc::new(DummyRhi::new(1 << 20, 1 << 20));
        let desc = PoolDesc::default().with_block_size(256).with_block_count_range(2, 0);
        let pool = Pool::new(rhi, &desc, None).unwrap();
        let budget = BudgetTracker::new();

        let a = pool.allocate(256, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let b = pool.allocate(64, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        // `a` fills the first block; `b` lands in a freshly grown second block.
        pool.free(&a, &budget);
        // First block is now empty and has room again; a defrag pass should
        // offer to move `b` back into it.
        let ctx = DefragmentationContext::new(&pool, DefragmentationFlags::empty());
        let moves = ctx.begin_pass(&budget);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].size, 64);
        let resolutions = vec![MoveOperation::Copy; moves.len()];
        ctx.end_pass(&moves, &resolutions, &budget);
        // `min_block_count` keeps both blocks alive, but the second block
        // should have nothing left to compact.
        assert!(ctx.begin_pass(&budget).is_empty());
    }

    #[test]
    fn no_moves_when_already_compact() {
        let rhi = Arc::new(DummyRhi::new(1 << 20, 1 << 20));
        let desc = PoolDesc::default().with_block_size(1024);
        let pool = Pool::new(rhi, &desc, None).unwrap();
        let budget = BudgetTracker::new();
        pool.allocate(64, 1, AllocationFlags::empty(), SuballocationType::Buffer, 0, &budget).unwrap();
        let ctx = DefragmentationContext::new(&pool, DefragmentationFlags::empty());
        assert!(ctx.begin_pass(&budget).is_empty());
    }
}
