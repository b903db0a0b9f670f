//! Smallest possible end-to-end use: create a default allocator over the
//! in-process dummy device, suballocate one buffer, free it.

use gpuma::rhi::dummy::DummyRhi;
use gpuma::rhi::{HeapType, ResourceClass, ResourceDesc};
use gpuma::{AllocationDesc, Allocator, AllocatorDesc};

fn main() {
    env_logger::init();

    let allocator = Allocator::new(DummyRhi::new(256 << 20, 256 << 20), AllocatorDesc::default());

    let resource_desc = ResourceDesc { size: 64 * 1024, alignment: 256, class: ResourceClass::Buffer, heap_type: HeapType::Default };
    let (allocation, _resource) = allocator.create_resource(&AllocationDesc::default(), &resource_desc).unwrap();

    println!("allocated {} bytes at heap offset within its block", resource_desc.size);
    println!("{}", allocator.build_stats_string(false));

    allocator.free(allocation);
}
