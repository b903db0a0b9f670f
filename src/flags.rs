//! Bitflag types for allocator, pool, allocation, and virtual-block configuration.
//!
//! Expressed with `bitflags`, the same crate `gwihlidal-vk-mem-rs` uses for an
//! equivalent FFI-adjacent flag surface, rather than hand-rolled bit constants.

use bitflags::bitflags;

bitflags! {
    /// Strategy and behavior flags for a single allocation request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllocationFlags: u32 {
        /// Allocate dedicated device memory rather than placing in a block.
        const COMMITTED = 1 << 0;
        /// Never allocate dedicated memory, even if placement would otherwise fall back to it.
        const NEVER_ALLOCATE = 1 << 1;
        /// Create the allocation for aliasing an existing resource's memory.
        const CAN_ALIAS = 1 << 2;
        /// Upper-address (stack-from-the-end) placement, only meaningful for linear metadata.
        const UPPER_ADDRESS = 1 << 3;
        /// Prefer the fastest search, may waste more memory.
        const STRATEGY_MIN_TIME = 1 << 4;
        /// Prefer the smallest memory footprint, may be slower to place.
        const STRATEGY_MIN_MEMORY = 1 << 5;
        /// Prefer the lowest memory offset, for debugging/determinism.
        const STRATEGY_MIN_OFFSET = 1 << 6;
        /// Opt into budget enforcement: reject the request rather than
        /// exceeding the configured budget. Without this flag no budget
        /// check is performed.
        const WITHIN_BUDGET = 1 << 7;
    }
}

impl AllocationFlags {
    /// Returns true if more than one mutually exclusive strategy flag is set.
    pub fn has_conflicting_strategy(self) -> bool {
        let strategies = [
            Self::STRATEGY_MIN_TIME,
            Self::STRATEGY_MIN_MEMORY,
            Self::STRATEGY_MIN_OFFSET,
        ];
        strategies.iter().filter(|f| self.contains(**f)).count() > 1
    }
}

bitflags! {
    /// Flags controlling a custom pool's behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PoolFlags: u32 {
        /// Use the ring-buffer/double-stack linear metadata instead of general metadata.
        const ALGORITHM_LINEAR = 1 << 0;
        /// Force MSAA-capable (RT/DS) textures allocated from this pool to committed memory.
        const MSAA_TEXTURES_ALWAYS_COMMITTED = 1 << 1;
        /// Always prefer committed allocations over placed ones, for this pool only.
        const ALWAYS_COMMITTED = 1 << 2;
    }
}

bitflags! {
    /// Flags controlling allocator-wide behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllocatorFlags: u32 {
        /// Caller guarantees all allocator calls are made from a single thread;
        /// disables the heavy-contention debug mutex, but the data-structure
        /// mutexes are still taken (see DESIGN.md Open Question).
        const SINGLE_THREADED = 1 << 0;
        /// Always prefer committed allocations over placed ones.
        const ALWAYS_DEDICATED_MEMORY = 1 << 1;
        /// Informational: default pools are allowed to hand back heaps whose
        /// bytes are not zero-initialized. Recorded on the allocator and
        /// queryable, but not threaded into any `Rhi` backend in this crate
        /// (see DESIGN.md).
        const DEFAULT_POOLS_NOT_ZEROED = 1 << 2;
        /// Force MSAA-capable (RT/DS) textures to committed memory across every default pool.
        const MSAA_TEXTURES_ALWAYS_COMMITTED = 1 << 3;
        /// Disable the heuristic that prefers committed allocations for small buffers.
        const DONT_PREFER_SMALL_BUFFERS_COMMITTED = 1 << 4;
        /// Always use the conservative (larger) small-resource placement
        /// alignment, skipping the tight-alignment path even when the RHI
        /// reports support for it.
        const DONT_USE_TIGHT_ALIGNMENT = 1 << 5;
    }
}

bitflags! {
    /// Flags controlling a defragmentation pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DefragmentationFlags: u32 {
        /// Favor algorithm speed over the amount of memory reclaimed.
        const ALGORITHM_FAST = 1 << 0;
        /// Favor memory reclaimed over algorithm speed.
        const ALGORITHM_FULL = 1 << 1;
    }
}

bitflags! {
    /// Flags for a virtual block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VirtualBlockFlags: u32 {
        /// Use linear (ring/stack) metadata instead of general metadata.
        const ALGORITHM_LINEAR = 1 << 0;
    }
}

bitflags! {
    /// Flags for a single virtual allocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VirtualAllocationFlags: u32 {
        /// Upper-address placement (linear metadata only).
        const UPPER_ADDRESS = 1 << 0;
        const STRATEGY_MIN_TIME = 1 << 1;
        const STRATEGY_MIN_MEMORY = 1 << 2;
        const STRATEGY_MIN_OFFSET = 1 << 3;
    }
}

/// Placement search strategy, derived from the mutually-exclusive `STRATEGY_*` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationStrategy {
    #[default]
    MinTime,
    MinMemory,
    MinOffset,
}

impl AllocationStrategy {
    pub fn from_flags(flags: AllocationFlags) -> Self {
        if flags.contains(AllocationFlags::STRATEGY_MIN_MEMORY) {
            Self::MinMemory
        } else if flags.contains(AllocationFlags::STRATEGY_MIN_OFFSET) {
            Self::MinOffset
        } else {
            Self::MinTime
        }
    }

    pub fn from_virtual_flags(flags: VirtualAllocationFlags) -> Self {
        if flags.contains(VirtualAllocationFlags::STRATEGY_MIN_MEMORY) {
            Self::MinMemory
        } else if flags.contains(VirtualAllocationFlags::STRATEGY_MIN_OFFSET) {
            Self::MinOffset
        } else {
            Self::MinTime
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_conflicting_strategy_flags() {
        let flags = AllocationFlags::STRATEGY_MIN_TIME | AllocationFlags::STRATEGY_MIN_MEMORY;
        assert!(flags.has_conflicting_strategy());
        assert!(!AllocationFlags::STRATEGY_MIN_TIME.has_conflicting_strategy());
    }

    #[test]
    fn strategy_defaults_to_min_time() {
        assert_eq!(AllocationStrategy::from_flags(AllocationFlags::empty()), AllocationStrategy::MinTime);
        assert_eq!(
            AllocationStrategy::from_flags(AllocationFlags::STRATEGY_MIN_OFFSET),
            AllocationStrategy::MinOffset
        );
    }
}
