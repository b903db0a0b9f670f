//! The top-level allocator facade: owns the default,
//! heap-type-keyed pools, the budget tracker, and the committed-allocation
//! bookkeeping, and exposes `create_resource`/`allocate_memory`/
//! `create_aliasing_resource`/`create_pool`/`begin_defragmentation`/budget
//! and statistics queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocation::{Allocation, AllocationCase, BlockId};
use crate::budget::{Budget, BudgetTracker};
use crate::callbacks::AllocationCallbacks;
use crate::committed_list::CommittedAllocationList;
use crate::config::{AllocationDesc, AllocatorDesc, PoolDesc};
use crate::defrag::DefragmentationContext;
use crate::error::{AllocError, Result};
use crate::flags::{AllocationFlags, AllocatorFlags, DefragmentationFlags, PoolFlags};
use crate::metadata::{DetailedStatistics, SuballocationType};
use crate::pool::Pool;
use crate::rhi::{HeapType, MemorySegmentGroup, ResourceClass, ResourceDesc, Rhi};
use crate::stats::{build_stats_string, TotalStatistics};
use crate::sync::RwLock;

fn segment_for(heap_type: HeapType) -> MemorySegmentGroup {
    match heap_type {
        HeapType::Default => MemorySegmentGroup::Local,
        HeapType::Upload | HeapType::Readback | HeapType::Custom(_) => MemorySegmentGroup::NonLocal,
    }
}

fn suballocation_type_for(class: ResourceClass) -> SuballocationType {
    match class {
        ResourceClass::Buffer => SuballocationType::Buffer,
        ResourceClass::SmallTexture | ResourceClass::NonSmallTexture | ResourceClass::RtDsTexture => SuballocationType::Texture2D,
    }
}

/// Buffers at or under this size default to committed allocation unless
/// `DontPreferSmallBuffersCommitted` is set — suballocating them wastes
/// more of a shared block's bookkeeping than it saves.
const SMALL_BUFFER_COMMITTED_THRESHOLD: u64 = 4 * 1024;

/// The original's `D3D12_SMALL_RESOURCE_PLACEMENT_ALIGNMENT` /
/// `D3D12_DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT`: a small texture is normally
/// allowed the tighter 4 KiB alignment, but conservative placement mode (or
/// a RHI that doesn't support tight alignment) falls back to the coarser
/// 64 KiB default instead.
const DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Top-level allocator object.
///
/// Generic over the `Rhi` implementation so the whole allocator can be used
/// with [`crate::rhi::dummy::DummyRhi`] in tests and demos, or a real
/// backend behind the `gpu-vulkan` feature.
pub struct Allocator<R: Rhi> {
    rhi: Arc<R>,
    desc: AllocatorDesc,
    callbacks: Option<AllocationCallbacks>,
    budget: BudgetTracker,
    default_pools: RwLock<HashMap<HeapType, Pool<R>>>,
    custom_pools: RwLock<Vec<Option<Pool<R>>>>,
    committed: CommittedAllocationList,
    current_frame_index: AtomicU64,
}

impl<R: Rhi> Allocator<R> {
    pub fn new(rhi: R, desc: AllocatorDesc) -> Self {
        let rhi = Arc::new(rhi);
        let budget = BudgetTracker::new();
        budget.refresh(rhi.as_ref(), MemorySegmentGroup::Local);
        budget.refresh(rhi.as_ref(), MemorySegmentGroup::NonLocal);
        Self {
            rhi,
            desc,
            callbacks: None,
            budget,
            default_pools: RwLock::new(HashMap::new()),
            custom_pools: RwLock::new(Vec::new()),
            committed: CommittedAllocationList::new(),
            current_frame_index: AtomicU64::new(0),
        }
    }

    pub fn with_callbacks(mut self, callbacks: AllocationCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn rhi(&self) -> &R {
        &self.rhi
    }

    pub fn set_current_frame_index(&self, frame: u64) {
        self.current_frame_index.store(frame, Ordering::Relaxed);
    }

    pub fn current_frame_index(&self) -> u64 {
        self.current_frame_index.load(Ordering::Relaxed)
    }

    /// Set an artificial budget cap for `group`, independent of the
    /// device's reported capacity.
    pub fn set_budget_cap(&self, group: MemorySegmentGroup, cap: Option<u64>) {
        self.budget.set_cap(group, cap);
    }

    pub fn get_budget(&self, group: MemorySegmentGroup) -> Budget {
        self.budget.refresh(self.rhi.as_ref(), group);
        self.budget.get_budget(group)
    }

    /// Get or lazily create the default pool for `heap_type`.
    fn ensure_default_pool(&self, heap_type: HeapType) -> Result<()> {
        if self.default_pools.read().contains_key(&heap_type) {
            return Ok(());
        }
        let mut pools = self.default_pools.write();
        if !pools.contains_key(&heap_type) {
            let desc = PoolDesc::default().with_heap_type(heap_type).with_block_size(self.desc.preferred_block_size);
            pools.insert(heap_type, Pool::new(self.rhi.clone(), &desc, self.callbacks.as_ref())?);
        }
        Ok(())
    }

    fn allocate_placed(&self, alloc_desc: &AllocationDesc, size: u64, alignment: u64, ty: SuballocationType) -> Result<Allocation> {
        if let Some(index) = alloc_desc.custom_pool {
            let pools = self.custom_pools.read();
            let pool = pools.get(index).and_then(|p| p.as_ref()).ok_or(AllocError::InvalidArgument("unknown custom pool"))?;
            let mut allocation = pool.allocate(size, alignment, alloc_desc.flags, ty, alloc_desc.private_data, &self.budget)?;
            allocation.heap_type = pool.heap_type();
            return Ok(allocation.with_pool(index));
        }
        self.ensure_default_pool(alloc_desc.heap_type)?;
        let pools = self.default_pools.read();
        let pool = pools.get(&alloc_desc.heap_type).expect("default pool created above");
        let mut allocation = pool.allocate(size, alignment, alloc_desc.flags, ty, alloc_desc.private_data, &self.budget)?;
        allocation.heap_type = alloc_desc.heap_type;
        Ok(allocation)
    }

    /// Borrow the device heap a placed allocation lives in, by routing
    /// through whichever pool (custom or default) produced it.
    fn with_heap<T>(&self, allocation: &Allocation, block: BlockId, f: impl FnOnce(&R::Heap) -> T) -> Result<T> {
        match allocation.pool {
            Some(index) => {
                let pools = self.custom_pools.read();
                let pool = pools.get(index).and_then(|p| p.as_ref()).ok_or(AllocError::InvalidArgument("custom pool no longer exists"))?;
                pool.with_heap(block, f).ok_or(AllocError::InvalidArgument("block not found in pool"))
            }
            None => {
                let pools = self.default_pools.read();
                let pool = pools.get(&allocation.heap_type).ok_or(AllocError::InvalidArgument("default pool no longer exists"))?;
                pool.with_heap(block, f).ok_or(AllocError::InvalidArgument("block not found in default pool"))
            }
        }
    }

    /// Pool-level flags for `alloc_desc`'s target pool, or `PoolFlags::empty()`
    /// for the default pools (which never carry per-pool flags).
    fn target_pool_flags(&self, alloc_desc: &AllocationDesc) -> PoolFlags {
        match alloc_desc.custom_pool {
            Some(index) => self.custom_pools.read().get(index).and_then(|p| p.as_ref()).map(Pool::flags).unwrap_or_else(PoolFlags::empty),
            None => PoolFlags::empty(),
        }
    }

    /// `CreateResource`. Decision tree: dedicated heap when
    /// `AllocationFlags::COMMITTED` or `AllocatorFlags::ALWAYS_DEDICATED_MEMORY`
    /// is set; when the resource is a small buffer and
    /// `DontPreferSmallBuffersCommitted` is not set; when the resource is an
    /// MSAA-capable (RT/DS) texture and `MsaaTexturesAlwaysCommitted` is set
    /// globally or on the target pool; or when placement fails and
    /// `NEVER_ALLOCATE` was not requested. Placed suballocation otherwise.
    ///
    /// `CAN_ALIAS` is rejected here; use [`Self::allocate_memory`] plus
    /// [`Self::create_aliasing_resource`] for that path instead — see
    /// DESIGN.md for why the two are kept separate.
    pub fn create_resource(&self, alloc_desc: &AllocationDesc, resource_desc: &ResourceDesc) -> Result<(Allocation, R::Resource)> {
        if alloc_desc.flags.contains(AllocationFlags::CAN_ALIAS) {
            return Err(AllocError::InvalidArgument("CreateResource does not support CAN_ALIAS; use AllocateMemory"));
        }
        let pool_flags = self.target_pool_flags(alloc_desc);

        let small_buffer_committed = resource_desc.class == ResourceClass::Buffer
            && resource_desc.size <= SMALL_BUFFER_COMMITTED_THRESHOLD
            && !self.desc.flags.contains(AllocatorFlags::DONT_PREFER_SMALL_BUFFERS_COMMITTED);
        let msaa_committed = resource_desc.class == ResourceClass::RtDsTexture
            && (self.desc.flags.contains(AllocatorFlags::MSAA_TEXTURES_ALWAYS_COMMITTED)
                || pool_flags.contains(PoolFlags::MSAA_TEXTURES_ALWAYS_COMMITTED));

        let force_committed = alloc_desc.flags.contains(AllocationFlags::COMMITTED)
            || self.desc.flags.contains(AllocatorFlags::ALWAYS_DEDICATED_MEMORY)
            || pool_flags.contains(PoolFlags::ALWAYS_COMMITTED)
            || small_buffer_committed
            || msaa_committed;

        if !force_committed {
            match self.try_placed_resource(alloc_desc, resource_desc) {
                Ok(result) => return Ok(result),
                Err(AllocError::OutOfDeviceMemory) if alloc_desc.flags.contains(AllocationFlags::NEVER_ALLOCATE) => {
                    return Err(AllocError::OutOfDeviceMemory);
                }
                Err(_not_placeable) => {}
            }
        }

        self.committed_resource(alloc_desc, resource_desc)
    }

    /// Placement alignment actually used for a suballocated resource.
    ///
    /// Small textures are normally eligible for the tighter
    /// `resource_desc.alignment` the caller already computed; this only
    /// ever *widens* it to `DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT` when
    /// conservative placement applies. Build-time mode: `small-alignment-query`
    /// asks the RHI directly; otherwise mode 1 (conservative) widens unless
    /// the RHI reports tight-alignment support (`AllocatorCaps::is_tight_alignment_supported`)
    /// and the caller hasn't set `DontUseTightAlignment`; `small-alignment-never`
    /// additionally lets `StrategyMinMemory` callers opt out of widening even
    /// without RHI support. See DESIGN.md.
    #[allow(unused_variables)]
    fn effective_alignment(&self, alloc_desc: &AllocationDesc, resource_desc: &ResourceDesc) -> u64 {
        if resource_desc.class != ResourceClass::SmallTexture {
            return resource_desc.alignment;
        }

        #[cfg(feature = "small-alignment-query")]
        {
            if let Some(queried) = self.rhi.query_small_alignment(resource_desc.class) {
                return queried.max(resource_desc.alignment);
            }
        }

        #[cfg(feature = "small-alignment-never")]
        {
            if alloc_desc.flags.contains(AllocationFlags::STRATEGY_MIN_MEMORY) {
                return resource_desc.alignment;
            }
        }

        if self.desc.flags.contains(AllocatorFlags::DONT_USE_TIGHT_ALIGNMENT) {
            return resource_desc.alignment.max(DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT);
        }
        if self.rhi.caps().is_tight_alignment_supported {
            return resource_desc.alignment;
        }
        resource_desc.alignment.max(DEFAULT_RESOURCE_PLACEMENT_ALIGNMENT)
    }

    fn try_placed_resource(&self, alloc_desc: &AllocationDesc, resource_desc: &ResourceDesc) -> Result<(Allocation, R::Resource)> {
        let ty = suballocation_type_for(resource_desc.class);
        let alignment = self.effective_alignment(alloc_desc, resource_desc);
        let mut allocation = self.allocate_placed(alloc_desc, resource_desc.size, alignment, ty)?;
        allocation.suballocation_type = ty;
        let AllocationCase::Placed { block, .. } = allocation.case else { unreachable!("allocate_placed always returns Placed") };
        let offset = allocation.offset;
        let created = self.with_heap(&allocation, block, |heap| self.rhi.create_placed(heap, offset, resource_desc));
        let resource = match created.and_then(|inner| inner) {
            Ok(resource) => resource,
            Err(e) => {
                self.free(allocation);
                return Err(e);
            }
        };
        Ok((allocation, resource))
    }

    fn committed_resource(&self, alloc_desc: &AllocationDesc, resource_desc: &ResourceDesc) -> Result<(Allocation, R::Resource)> {
        if alloc_desc.flags.contains(AllocationFlags::WITHIN_BUDGET) && !self.budget.can_commit(resource_desc.heap_type, resource_desc.size)
        {
            return Err(AllocError::WithinBudgetExceeded);
        }
        let resource = self.rhi.create_committed(resource_desc)?;
        self.budget.record_commit(resource_desc.heap_type, resource_desc.size);

        let committed_id = self.committed.register(resource_desc.size);

        let mut allocation = Allocation::new_committed(resource_desc.size, resource_desc.alignment, committed_id, resource_desc.heap_type);
        allocation.suballocation_type = suballocation_type_for(resource_desc.class);
        allocation.private_data = alloc_desc.private_data;
        if let Some(index) = alloc_desc.custom_pool {
            allocation = allocation.with_pool(index);
        }
        Ok((allocation, resource))
    }

    /// `AllocateMemory`: the heap-only variant. No resource
    /// is created; the caller may later create a resource over the
    /// returned allocation's heap/offset via [`Self::create_aliasing_resource`]
    /// (for placed allocations) or the `Rhi` directly (for dedicated ones).
    pub fn allocate_memory(&self, alloc_desc: &AllocationDesc, size: u64, alignment: u64) -> Result<Allocation> {
        let force_committed = alloc_desc.flags.contains(AllocationFlags::COMMITTED) || self.desc.flags.contains(AllocatorFlags::ALWAYS_DEDICATED_MEMORY);

        if !force_committed {
            match self.allocate_placed(alloc_desc, size, alignment, SuballocationType::Unknown) {
                Ok(allocation) => return Ok(allocation),
                Err(AllocError::OutOfDeviceMemory) if alloc_desc.flags.contains(AllocationFlags::NEVER_ALLOCATE) => {
                    return Err(AllocError::OutOfDeviceMemory);
                }
                Err(_not_placeable) => {}
            }
        }

        if alloc_desc.flags.contains(AllocationFlags::WITHIN_BUDGET) && !self.budget.can_commit(alloc_desc.heap_type, size) {
            return Err(AllocError::WithinBudgetExceeded);
        }
        let heap = self.rhi.create_heap(size, alloc_desc.heap_type)?;
        self.budget.record_block_created(alloc_desc.heap_type, size);
        self.budget.record_commit(alloc_desc.heap_type, size);

        let committed_id = self.committed.register(size);

        let mut allocation = Allocation::new_heap(size, alignment, Box::new(heap), committed_id, alloc_desc.heap_type);
        allocation.private_data = alloc_desc.private_data;
        if let Some(index) = alloc_desc.custom_pool {
            allocation = allocation.with_pool(index);
        }
        Ok(allocation)
    }

    /// `CreateAliasingResource`: ask the RHI to create an
    /// additional resource aliasing the memory of `allocation` at
    /// `allocation.offset + local_offset`. The allocator does not track the
    /// resulting resource or the allocation it aliases against each other;
    /// the caller owns the resource's lifetime and any barriers between it
    /// and other aliases of the same range.
    pub fn create_aliasing_resource(&self, allocation: &Allocation, local_offset: u64, resource_desc: &ResourceDesc) -> Result<R::Resource> {
        let AllocationCase::Placed { block, .. } = allocation.case else {
            return Err(AllocError::InvalidArgument("aliasing is only supported over placed allocations"));
        };
        let offset = allocation.offset + local_offset;
        self.with_heap(allocation, block, |heap| self.rhi.create_aliasing(heap, offset, resource_desc))?
    }

    /// Release `allocation`. Placed allocations route back to whichever
    /// pool (custom or default) produced them; committed and heap-only
    /// allocations are unregistered from the committed list and have their
    /// budget reservation reversed. Dropping a `Heap`-case allocation is
    /// what actually releases its device memory.
    pub fn free(&self, allocation: Allocation) {
        match &allocation.case {
            AllocationCase::Placed { .. } => match allocation.pool {
                Some(index) => {
                    let pools = self.custom_pools.read();
                    if let Some(Some(pool)) = pools.get(index) {
                        pool.free(&allocation, &self.budget);
                    }
                }
                None => {
                    let pools = self.default_pools.read();
                    if let Some(pool) = pools.get(&allocation.heap_type) {
                        pool.free(&allocation, &self.budget);
                    }
                }
            },
            AllocationCase::Committed { committed_id } => {
                self.committed.unregister(*committed_id);
                self.budget.record_free(allocation.heap_type, allocation.size);
            }
            AllocationCase::Heap { committed_id, .. } => {
                self.committed.unregister(*committed_id);
                self.budget.record_free(allocation.heap_type, allocation.size);
                self.budget.record_block_destroyed(allocation.heap_type, allocation.size);
            }
        }
    }

    /// `CreatePool`: validates and creates a custom pool,
    /// returning an index later `AllocationDesc::with_custom_pool` calls use
    /// to route allocations to it.
    pub fn create_pool(&self, desc: &PoolDesc) -> Result<usize> {
        let pool = Pool::new(self.rhi.clone(), desc, self.callbacks.as_ref())?;
        let mut pools = self.custom_pools.write();
        pools.push(Some(pool));
        Ok(pools.len() - 1)
    }

    /// Destroy a custom pool. Asserts (rather than returning an error) if
    /// it still has live allocations — that is a programmer error.
    pub fn destroy_pool(&self, index: usize) {
        let mut pools = self.custom_pools.write();
        if let Some(slot) = pools.get_mut(index) {
            let pool = slot.take().expect("pool already destroyed or never existed");
            assert!(pool.is_empty(), "destroying a pool with live allocations");
        }
    }

    pub fn begin_defragmentation(&self, pool_index: usize, flags: DefragmentationFlags) -> Result<DefragmentationContext<R>> {
        let pools = self.custom_pools.read();
        let pool = pools.get(pool_index).and_then(|p| p.as_ref()).ok_or(AllocError::InvalidArgument("unknown custom pool"))?;
        Ok(DefragmentationContext::new(pool, flags))
    }

    pub fn budget_tracker(&self) -> &BudgetTracker {
        &self.budget
    }

    /// `CalculateStatistics`: folds detailed statistics
    /// across every pool (default and custom) and the committed-allocation
    /// list into per-segment-group and grand totals.
    pub fn calculate_statistics(&self) -> TotalStatistics {
        let mut total = TotalStatistics::default();
        for pool in self.default_pools.read().values() {
            let mut detailed = DetailedStatistics::default();
            pool.add_detailed_statistics(&mut detailed);
            total.add(segment_for(pool.heap_type()), &detailed);
        }
        for pool in self.custom_pools.read().iter().flatten() {
            let mut detailed = DetailedStatistics::default();
            pool.add_detailed_statistics(&mut detailed);
            total.add(segment_for(pool.heap_type()), &detailed);
        }
        // Committed/heap-only allocations aren't keyed to a single segment
        // group at this layer; fold them into Local as an approximation
        // (see DESIGN.md Open Questions).
        let mut committed_stats = DetailedStatistics::default();
        self.committed.add_detailed_statistics(&mut committed_stats);
        total.add(MemorySegmentGroup::Local, &committed_stats);
        total
    }

    /// Every suballocation across every pool and the committed-allocation
    /// list, split by segment group the same way `calculate_statistics`
    /// folds its totals (committed/heap-only entries land in `Local`; see
    /// DESIGN.md Open Questions).
    fn collect_suballocations(&self) -> (Vec<crate::metadata::Suballocation>, Vec<crate::metadata::Suballocation>) {
        let mut local = Vec::new();
        let mut non_local = Vec::new();
        for pool in self.default_pools.read().values() {
            let bucket = match segment_for(pool.heap_type()) {
                MemorySegmentGroup::Local => &mut local,
                MemorySegmentGroup::NonLocal => &mut non_local,
            };
            bucket.extend(pool.collect_suballocations());
        }
        for pool in self.custom_pools.read().iter().flatten() {
            let bucket = match segment_for(pool.heap_type()) {
                MemorySegmentGroup::Local => &mut local,
                MemorySegmentGroup::NonLocal => &mut non_local,
            };
            bucket.extend(pool.collect_suballocations());
        }
        local.extend(self.committed.collect_suballocations());
        (local, non_local)
    }

    /// `BuildStatsString`: the allocator-wide JSON dump. When `detailed` is
    /// set, each segment group's object carries a `Suballocations` array
    /// (offset/size/type only — per-allocation usage, custom data, name,
    /// and layout aren't retained once a pool hands an `Allocation` back to
    /// its caller; see DESIGN.md Open Questions).
    pub fn build_stats_string(&self, detailed: bool) -> String {
        let stats = self.calculate_statistics();
        if detailed {
            let (local, non_local) = self.collect_suballocations();
            crate::stats::build_detailed_stats_string(&stats, &self.budget, &local, &non_local)
        } else {
            build_stats_string(&stats, &self.budget, detailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::dummy::DummyRhi;

    fn desc(size: u64, alignment: u64) -> ResourceDesc {
        ResourceDesc { size, alignment, class: ResourceClass::Buffer, heap_type: HeapType::Default }
    }

    #[test]
    fn placed_resource_round_trips() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let (allocation, _resource) = allocator.create_resource(&AllocationDesc::default(), &desc(256, 16)).unwrap();
        assert!(allocation.is_placed());
        allocator.free(allocation);
    }

    #[test]
    fn committed_flag_forces_dedicated_memory() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let alloc_desc = AllocationDesc::default().with_flags(AllocationFlags::COMMITTED);
        let (allocation, _resource) = allocator.create_resource(&alloc_desc, &desc(256, 16)).unwrap();
        assert!(!allocation.is_placed());
        allocator.free(allocation);
    }

    #[test]
    fn allocate_memory_reserves_without_a_resource() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let allocation = allocator.allocate_memory(&AllocationDesc::default(), 1024, 256).unwrap();
        assert!(allocation.is_placed());
        allocator.free(allocation);
    }

    #[test]
    fn custom_pool_routes_allocations() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let pool = allocator.create_pool(&PoolDesc::default().with_block_size(1024)).unwrap();
        let alloc_desc = AllocationDesc::default().with_custom_pool(pool);
        let allocation = allocator.allocate_memory(&alloc_desc, 256, 16).unwrap();
        assert_eq!(allocation.pool, Some(pool));
        allocator.free(allocation);
        allocator.destroy_pool(pool);
    }

    #[test]
    fn aliasing_resource_shares_a_placed_allocations_range() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let alloc_desc = AllocationDesc::default().with_flags(AllocationFlags::CAN_ALIAS);
        let allocation = allocator.allocate_memory(&alloc_desc, 1024, 256).unwrap();
        let alias_desc = desc(512, 256);
        let _a = allocator.create_aliasing_resource(&allocation, 0, &alias_desc).unwrap();
        let _b = allocator.create_aliasing_resource(&allocation, 0, &alias_desc).unwrap();
        allocator.free(allocation);
    }

    #[test]
    fn statistics_reflect_live_allocations() {
        let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());
        let allocation = allocator.allocate_memory(&AllocationDesc::default(), 256, 16).unwrap();
        let stats = allocator.calculate_statistics();
        assert_eq!(stats.total.stats.allocation_count, 1);
        allocator.free(allocation);
    }

    #[test]
    fn never_allocate_rejects_when_nothing_fits_and_committed_fallback_disabled() {
        let allocator = Allocator::new(DummyRhi::new(1024, 1024), AllocatorDesc::default());
        let tiny_pool = allocator.create_pool(&PoolDesc::default().with_block_size(64).with_block_count_range(0, 1)).unwrap();
        let alloc_desc = AllocationDesc::default().with_custom_pool(tiny_pool).with_flags(AllocationFlags::NEVER_ALLOCATE);
        let err = allocator.allocate_memory(&alloc_desc, 128, 16).unwrap_err();
        assert!(matches!(err, AllocError::OutOfDeviceMemory));
    }
}
