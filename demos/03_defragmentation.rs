//! Driving one incremental defragmentation pass by hand: propose moves,
//! "copy" them (there's nothing to actually copy against a dummy device),
//! report back, and watch a now-empty block retire.

use gpuma::defrag::MoveOperation;
use gpuma::flags::DefragmentationFlags;
use gpuma::rhi::dummy::DummyRhi;
use gpuma::{AllocationDesc, Allocator, AllocatorDesc, PoolDesc};

fn main() {
    env_logger::init();

    let allocator = Allocator::new(DummyRhi::new(64 << 20, 64 << 20), AllocatorDesc::default());
    let pool = allocator.create_pool(&PoolDesc::default().with_block_size(4096).with_block_count_range(2, 0)).unwrap();
    let alloc_desc = AllocationDesc::default().with_custom_pool(pool);

    let filler = allocator.allocate_memory(&alloc_desc, 4096, 256).unwrap();
    let survivor = allocator.allocate_memory(&alloc_desc, 256, 256).unwrap();
    allocator.free(filler);

    println!("before: {} blocks", allocator.calculate_statistics().total.stats.block_count);

    let ctx = allocator.begin_defragmentation(pool, DefragmentationFlags::empty()).unwrap();
    let budget = allocator.budget_tracker();
    let moves = ctx.begin_pass(budget);
    println!("pass proposed {} move(s)", moves.len());
    let resolutions = vec![MoveOperation::Copy; moves.len()];
    ctx.end_pass(&moves, &resolutions, budget);

    println!("after: {} blocks", allocator.calculate_statistics().total.stats.block_count);

    allocator.free(survivor);
    allocator.destroy_pool(pool);
}
