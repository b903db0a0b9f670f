//! Budget tracking across the two memory segment groups:
//! atomic running totals refreshed from the RHI's memory-capacity query, with
//! an optional artificial cap applied per group.
//!
//! Plain atomic counters, generalized from one running total to the two
//! segment groups device memory is split into here.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::rhi::{HeapType, MemorySegmentGroup, Rhi};

fn group_for(heap_type: HeapType) -> MemorySegmentGroup {
    match heap_type {
        HeapType::Default => MemorySegmentGroup::Local,
        HeapType::Upload | HeapType::Readback | HeapType::Custom(_) => MemorySegmentGroup::NonLocal,
    }
}

#[derive(Default)]
struct GroupCounters {
    block_bytes: AtomicU64,
    allocation_bytes: AtomicU64,
    device_total: AtomicU64,
    device_usage: AtomicU64,
    /// Artificial cap below the device total, or `u64::MAX` for none.
    cap: AtomicU64,
}

/// Tracks committed bytes per segment group and answers "would committing
/// `size` more bytes exceed the budget" for `AllocationFlags::WITHIN_BUDGET`
/// enforcement in [`crate::block_vector::BlockVector`].
pub struct BudgetTracker {
    local: GroupCounters,
    non_local: GroupCounters,
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self {
            local: GroupCounters { cap: AtomicU64::new(u64::MAX), ..GroupCounters::default() },
            non_local: GroupCounters { cap: AtomicU64::new(u64::MAX), ..GroupCounters::default() },
        }
    }
}

/// Point-in-time budget readout for one segment group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    pub block_bytes: u64,
    pub allocation_bytes: u64,
    pub usage: u64,
    pub budget: u64,
}

impl BudgetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, group: MemorySegmentGroup) -> &GroupCounters {
        match group {
            MemorySegmentGroup::Local => &self.local,
            MemorySegmentGroup::NonLocal => &self.non_local,
        }
    }

    /// Set a caller-imposed cap on `group`, independent of the device's own
    /// reported total. `None` clears the cap.
    pub fn set_cap(&self, group: MemorySegmentGroup, cap: Option<u64>) {
        self.counters(group).cap.store(cap.unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Refresh the device-reported total/usage for `group` from the Rhi
    ///.
    pub fn refresh<R: Rhi>(&self, rhi: &R, group: MemorySegmentGroup) {
        let (total, usage) = rhi.query_memory_capacity(group);
        let counters = self.counters(group);
        counters.device_total.store(total, Ordering::Relaxed);
        counters.device_usage.store(usage, Ordering::Relaxed);
    }

    /// Whether committing `size` more bytes for `heap_type` would exceed the
    /// effective budget: the lesser of the caller's cap and the device's
    /// reported total.
    pub fn can_commit(&self, heap_type: HeapType, size: u64) -> bool {
        let counters = self.counters(group_for(heap_type));
        let cap = counters.cap.load(Ordering::Relaxed);
        let device_total = counters.device_total.load(Ordering::Relaxed);
        let effective_cap = cap.min(if device_total == 0 { u64::MAX } else { device_total });
        if effective_cap == u64::MAX {
            return true;
        }
        let usage = counters.device_usage.load(Ordering::Relaxed) + counters.block_bytes.load(Ordering::Relaxed);
        usage.saturating_add(size) <= effective_cap
    }

    pub fn record_block_created(&self, heap_type: HeapType, size: u64) {
        self.counters(group_for(heap_type)).block_bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_block_destroyed(&self, heap_type: HeapType, size: u64) {
        self.counters(group_for(heap_type)).block_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    pub fn record_commit(&self, heap_type: HeapType, size: u64) {
        self.counters(group_for(heap_type)).allocation_bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_free(&self, heap_type: HeapType, size: u64) {
        self.counters(group_for(heap_type)).allocation_bytes.fetch_sub(size, Ordering::Relaxed);
    }

    pub fn get_budget(&self, group: MemorySegmentGroup) -> Budget {
        let counters = self.counters(group);
        let cap = counters.cap.load(Ordering::Relaxed);
        let device_total = counters.device_total.load(Ordering::Relaxed);
        let budget = cap.min(if device_total == 0 { u64::MAX } else { device_total });
        Budget {
            block_bytes: counters.block_bytes.load(Ordering::Relaxed),
            allocation_bytes: counters.allocation_bytes.load(Ordering::Relaxed),
            usage: counters.device_usage.load(Ordering::Relaxed) + counters.block_bytes.load(Ordering::Relaxed),
            budget: if budget == u64::MAX { 0 } else { budget },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::dummy::DummyRhi;

    #[test]
    fn no_cap_always_allows() {
        let tracker = BudgetTracker::new();
        assert!(tracker.can_commit(HeapType::Default, u64::MAX / 2));
    }

    #[test]
    fn cap_rejects_once_exceeded() {
        let tracker = BudgetTracker::new();
        tracker.set_cap(MemorySegmentGroup::Local, Some(1024));
        assert!(tracker.can_commit(HeapType::Default, 1024));
        tracker.record_commit(HeapType::Default, 900);
        assert!(!tracker.can_commit(HeapType::Default, 200));
        assert!(tracker.can_commit(HeapType::Default, 100));
    }

    #[test]
    fn refresh_pulls_device_totals() {
        let tracker = BudgetTracker::new();
        let rhi = DummyRhi::new(4096, 4096);
        tracker.refresh(&rhi, MemorySegmentGroup::Local);
        let budget = tracker.get_budget(MemorySegmentGroup::Local);
        assert!(budget.budget > 0);
    }

    #[test]
    fn record_block_and_free_round_trip() {
        let tracker = BudgetTracker::new();
        tracker.record_block_created(HeapType::Default, 1000);
        tracker.record_commit(HeapType::Default, 500);
        let budget = tracker.get_budget(MemorySegmentGroup::Local);
        assert_eq!(budget.block_bytes, 1000);
        assert_eq!(budget.allocation_bytes, 500);
        tracker.record_free(HeapType::Default, 500);
        tracker.record_block_destroyed(HeapType::Default, 1000);
        let budget = tracker.get_budget(MemorySegmentGroup::Local);
        assert_eq!(budget.block_bytes, 0);
        assert_eq!(budget.allocation_bytes, 0);
    }
}
