//! # gpuma
//!
//! A D3D12MA-style GPU memory allocator and virtual address space manager.
//!
//! `gpuma` is a suballocator, not a device abstraction: it is generic over
//! an [`rhi::Rhi`] implementation that knows how to create heaps and
//! resources on a real or simulated device, and handles everything above
//! that — block growth, best-fit/worst-fit/first-fit placement, budget
//! tracking across local/non-local memory segments, pool management,
//! incremental defragmentation, and CPU-only virtual address-space
//! suballocation.
//!
//! ## Quick start
//!
//! ```
//! use gpuma::allocator::Allocator;
//! use gpuma::config::{AllocationDesc, AllocatorDesc};
//! use gpuma::rhi::dummy::DummyRhi;
//! use gpuma::rhi::{ResourceClass, ResourceDesc, HeapType};
//!
//! let allocator = Allocator::new(DummyRhi::new(256 << 20, 256 << 20), AllocatorDesc::default());
//! let resource_desc = ResourceDesc { size: 4096, alignment: 256, class: ResourceClass::Buffer, heap_type: HeapType::Default };
//! let (allocation, _resource) = allocator.create_resource(&AllocationDesc::default(), &resource_desc).unwrap();
//! allocator.free(allocation);
//! ```

pub mod allocation;
pub mod allocator;
pub mod block;
pub mod block_vector;
pub mod budget;
pub mod callbacks;
pub mod committed_list;
pub mod config;
pub mod defrag;
pub mod error;
pub mod flags;
pub mod handle;
pub mod metadata;
pub mod pool;
pub mod rhi;
pub mod stats;
mod sync;
mod util;
pub mod virtual_block;

pub use allocation::{Allocation, AllocationCase};
pub use allocator::Allocator;
pub use config::{AllocationDesc, AllocatorDesc, PoolDesc, VirtualAllocationDesc, VirtualBlockDesc};
pub use error::{AllocError, Result};
pub use flags::{AllocationFlags, AllocatorFlags, DefragmentationFlags, PoolFlags, VirtualAllocationFlags, VirtualBlockFlags};
pub use pool::Pool;
pub use virtual_block::VirtualBlock;
