//! The committed-allocation list: tracks dedicated (non-suballocated) heaps
//! owned directly by a pool or the default pools.
//!
//! Backed by a slot-based pool allocator rather than a plain `Vec` keyed by
//! id — the slot index doubles as the id handed back to the caller, so
//! registration and unregistration are both O(1) instead of an append plus
//! a linear `position()` scan.

use crate::handle::AllocHandle;
use crate::metadata::{Suballocation, SuballocationType};
use crate::util::pool_alloc::PoolAllocator;

struct Entry {
    size: u64,
}

/// Tracks live committed (dedicated-heap) allocations for one pool or heap
/// type, purely for statistics — the heap/resource objects themselves are
/// owned by the [`crate::allocation::Allocation`] record.
#[derive(Default)]
pub struct CommittedAllocationList {
    entries: PoolAllocator<Entry>,
}

impl CommittedAllocationList {
    pub fn new() -> Self {
        Self { entries: PoolAllocator::new() }
    }

    /// Register a newly created committed/heap-only allocation of `size`
    /// bytes, returning the id to later pass to `unregister`.
    pub fn register(&self, size: u64) -> u64 {
        self.entries.insert(Entry { size }) as u64
    }

    pub fn unregister(&self, id: u64) {
        self.entries.remove(id as usize);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> u64 {
        let mut total = 0u64;
        self.entries.for_each(|e| total += e.size);
        total
    }

    pub fn add_statistics(&self, stats: &mut crate::metadata::Statistics) {
        let mut count = 0u64;
        let mut total = 0u64;
        self.entries.for_each(|e| {
            count += 1;
            total += e.size;
        });
        stats.block_count += count;
        stats.allocation_count += count;
        stats.block_bytes += total;
        stats.allocation_bytes += total;
    }

    /// Each committed/heap-only allocation as a degenerate one-entry
    /// "suballocation" for the detailed JSON dump. Offset and type aren't
    /// meaningful here (this list only ever tracked `size`), so they're
    /// reported as `0`/`Unknown` rather than guessed.
    pub fn collect_suballocations(&self) -> Vec<Suballocation> {
        let mut out = Vec::new();
        self.entries.for_each(|e| {
            out.push(Suballocation { offset: 0, size: e.size, ty: SuballocationType::Unknown, handle: AllocHandle::INVALID });
        });
        out
    }

    pub fn add_detailed_statistics(&self, stats: &mut crate::metadata::DetailedStatistics) {
        let mut block_count = 0u64;
        let mut block_bytes = 0u64;
        self.entries.for_each(|e| {
            block_count += 1;
            block_bytes += e.size;
            stats.add_allocation(e.size);
        });
        stats.stats.block_count += block_count;
        stats.stats.block_bytes += block_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister_round_trip() {
        let list = CommittedAllocationList::new();
        let a = list.register(1024);
        let b = list.register(2048);
        assert_eq!(list.count(), 2);
        assert_eq!(list.total_bytes(), 3072);
        list.unregister(a);
        assert_eq!(list.count(), 1);
        assert_eq!(list.total_bytes(), 2048);
        let _ = b;
    }

    #[test]
    fn unregister_is_idempotent_for_an_unknown_id() {
        let list = CommittedAllocationList::new();
        let a = list.register(512);
        list.unregister(a);
        list.unregister(a);
        assert_eq!(list.count(), 0);
    }

    #[test]
    fn statistics_cover_all_entries() {
        let list = CommittedAllocationList::new();
        list.register(500);
        list.register(700);
        let mut stats = crate::metadata::Statistics::default();
        list.add_statistics(&mut stats);
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.allocation_bytes, 1200);
    }
}
