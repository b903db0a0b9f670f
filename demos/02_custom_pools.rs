//! Dedicated pools: one fixed-size pool per resource class, so a texture
//! streaming system's blocks never compete with geometry buffers.

use gpuma::rhi::dummy::DummyRhi;
use gpuma::{AllocationDesc, Allocator, AllocatorDesc, PoolDesc};

fn main() {
    env_logger::init();

    let allocator = Allocator::new(DummyRhi::new(512 << 20, 512 << 20), AllocatorDesc::default());

    let textures = allocator.create_pool(&PoolDesc::default().with_block_size(64 << 20).with_name("textures")).unwrap();
    let geometry = allocator.create_pool(&PoolDesc::default().with_block_size(16 << 20).with_name("geometry")).unwrap();

    let tex_alloc = allocator.allocate_memory(&AllocationDesc::default().with_custom_pool(textures), 4 << 20, 64 * 1024).unwrap();
    let geo_alloc = allocator.allocate_memory(&AllocationDesc::default().with_custom_pool(geometry), 256 * 1024, 256).unwrap();

    println!("{}", allocator.build_stats_string(true));

    allocator.free(tex_alloc);
    allocator.free(geo_alloc);
    allocator.destroy_pool(textures);
    allocator.destroy_pool(geometry);
}
