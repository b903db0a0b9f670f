//! End-to-end coverage of `Allocator` driven purely through its public
//! surface, on the in-process `DummyRhi`. The block-metadata placement
//! strategies (ring-buffer, double-stack, best-fit vs first-fit) have
//! their own focused unit tests next to the code they exercise; these
//! tests cover what only shows up once an `Allocator` is wired end to
//! end: budget enforcement, aliasing, and defragmentation.

use gpuma::flags::{AllocationFlags, DefragmentationFlags};
use gpuma::rhi::dummy::DummyRhi;
use gpuma::rhi::{HeapType, MemorySegmentGroup, ResourceClass, ResourceDesc};
use gpuma::{AllocationDesc, Allocator, AllocatorDesc, PoolDesc};

fn buffer(size: u64, alignment: u64) -> ResourceDesc {
    ResourceDesc { size, alignment, class: ResourceClass::Buffer, heap_type: HeapType::Default }
}

#[test]
fn resource_lifecycle_round_trips_through_the_public_api() {
    let allocator = Allocator::new(DummyRhi::new(16 << 20, 16 << 20), AllocatorDesc::default());
    let (allocation, _resource) = allocator.create_resource(&AllocationDesc::default(), &buffer(4096, 256)).unwrap();
    assert_eq!(allocator.calculate_statistics().total.stats.allocation_count, 1);
    allocator.free(allocation);
    assert_eq!(allocator.calculate_statistics().total.stats.allocation_count, 0);
}

#[test]
fn within_budget_flag_rejects_when_cap_would_be_exceeded() {
    let allocator = Allocator::new(DummyRhi::new(64 << 20, 64 << 20), AllocatorDesc::default());
    allocator.set_budget_cap(MemorySegmentGroup::Local, Some(20 << 20));

    // Burn the cap down to 10 MiB of headroom.
    let filler = allocator.allocate_memory(&AllocationDesc::default(), 10 << 20, 256).unwrap();
    let before = allocator.calculate_statistics();

    let alloc_desc = AllocationDesc::default().with_flags(AllocationFlags::WITHIN_BUDGET);
    let err = allocator.create_resource(&alloc_desc, &buffer(20 << 20, 256)).unwrap_err();
    assert!(matches!(err, gpuma::AllocError::WithinBudgetExceeded));

    let after = allocator.calculate_statistics();
    assert_eq!(before.total.stats.allocation_count, after.total.stats.allocation_count);
    assert_eq!(before.total.stats.allocation_bytes, after.total.stats.allocation_bytes);

    allocator.free(filler);
}

#[test]
fn default_allocation_ignores_the_cap_without_the_within_budget_flag() {
    let allocator = Allocator::new(DummyRhi::new(64 << 20, 64 << 20), AllocatorDesc::default());
    allocator.set_budget_cap(MemorySegmentGroup::Local, Some(1 << 20));

    // No `WITHIN_BUDGET` flag: the cap is advisory only, not enforced.
    let (allocation, _resource) = allocator.create_resource(&AllocationDesc::default(), &buffer(8 << 20, 256)).unwrap();
    allocator.free(allocation);
}

#[test]
fn can_alias_reservation_backs_two_independent_resources() {
    let allocator = Allocator::new(DummyRhi::new(1 << 20, 1 << 20), AllocatorDesc::default());

    // `CreateResource` with `CAN_ALIAS` is rejected outright (see DESIGN.md);
    // the memory-only reservation path is `allocate_memory` instead.
    let aliasing_desc = AllocationDesc::default().with_flags(AllocationFlags::CAN_ALIAS);
    let err = allocator.create_resource(&aliasing_desc, &buffer(4096, 256)).unwrap_err();
    assert!(matches!(err, gpuma::AllocError::InvalidArgument(_)));

    let reservation = allocator.allocate_memory(&aliasing_desc, 1 << 20, 256).unwrap();
    let first = allocator.create_aliasing_resource(&reservation, 0, &buffer(512 << 10, 256)).unwrap();
    let second = allocator.create_aliasing_resource(&reservation, 0, &buffer(256 << 10, 256)).unwrap();
    drop((first, second));

    allocator.free(reservation);
}

#[test]
fn defragmentation_compacts_a_pool_from_two_blocks_to_one() {
    let allocator = Allocator::new(DummyRhi::new(16 << 20, 16 << 20), AllocatorDesc::default());
    let pool = allocator.create_pool(&PoolDesc::default().with_block_size(4096).with_block_count_range(2, 0)).unwrap();
    let alloc_desc = AllocationDesc::default().with_custom_pool(pool);

    // Fill the first block, forcing the second one to grow, then vacate the
    // first so a defrag pass has somewhere to relocate into.
    let filler = allocator.allocate_memory(&alloc_desc, 4096, 256).unwrap();
    let small = allocator.allocate_memory(&alloc_desc, 256, 256).unwrap();
    allocator.free(filler);

    let blocks_before = allocator.calculate_statistics().total.stats.block_count;
    assert_eq!(blocks_before, 2);

    let ctx = allocator.begin_defragmentation(pool, DefragmentationFlags::empty()).unwrap();
    let budget = allocator.budget_tracker();
    let moves = ctx.begin_pass(budget);
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].size, 256);

    // Caller's copy of the bytes happens outside this crate; report success.
    ctx.end_pass(&moves, &[gpuma::defrag::MoveOperation::Copy], budget);

    assert!(ctx.begin_pass(budget).is_empty());
    let blocks_after = allocator.calculate_statistics().total.stats.block_count;
    assert_eq!(blocks_after, 1);

    allocator.free(small);
    allocator.destroy_pool(pool);
}
