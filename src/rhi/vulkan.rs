//! Thin Vulkan `Rhi` binding, feature-gated behind `gpu-vulkan`.
//!
//! Memory-type search via `PhysicalDeviceMemoryProperties`, `unsafe impl
//! Send/Sync` for the raw-handle-holding resource type, a `Drop` impl that
//! frees device memory. Deliberately thin: it does not reimplement
//! descriptor or pipeline machinery, since the Rhi is an opaque
//! collaborator, not a renderer.

use std::sync::Arc;

use crate::error::{AllocError, Result};
use crate::rhi::{AllocatorCaps, DeviceHeap, DeviceResource, HeapType, MemorySegmentGroup, ResourceDesc, Rhi};

/// A raw Vulkan device memory allocation, used as a block's backing heap.
#[derive(Debug)]
pub struct VulkanHeap {
    memory: ash::vk::DeviceMemory,
    size: u64,
    device: Arc<ash::Device>,
}

impl DeviceHeap for VulkanHeap {
    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for VulkanHeap {
    fn drop(&mut self) {
        unsafe {
            self.device.free_memory(self.memory, None);
        }
    }
}

unsafe impl Send for VulkanHeap {}
unsafe impl Sync for VulkanHeap {}

/// A Vulkan buffer bound either to a placed offset within a `VulkanHeap` or
/// to its own dedicated allocation.
#[derive(Debug)]
pub struct VulkanResource {
    buffer: ash::vk::Buffer,
    dedicated_memory: Option<ash::vk::DeviceMemory>,
    device: Arc<ash::Device>,
}

impl DeviceResource for VulkanResource {}

impl Drop for VulkanResource {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            if let Some(memory) = self.dedicated_memory {
                self.device.free_memory(memory, None);
            }
        }
    }
}

unsafe impl Send for VulkanResource {}
unsafe impl Sync for VulkanResource {}

/// An `Rhi` driving a real Vulkan device.
pub struct VulkanRhi {
    device: Arc<ash::Device>,
    memory_properties: ash::vk::PhysicalDeviceMemoryProperties,
}

impl VulkanRhi {
    pub fn new(device: Arc<ash::Device>, physical_device: ash::vk::PhysicalDevice, instance: &ash::Instance) -> Self {
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        Self { device, memory_properties }
    }

    fn memory_type_index(&self, type_filter: u32, heap_type: HeapType) -> Result<u32> {
        let wanted = match heap_type {
            HeapType::Default => ash::vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HeapType::Upload => ash::vk::MemoryPropertyFlags::HOST_VISIBLE | ash::vk::MemoryPropertyFlags::HOST_COHERENT,
            HeapType::Readback => ash::vk::MemoryPropertyFlags::HOST_VISIBLE | ash::vk::MemoryPropertyFlags::HOST_CACHED,
            HeapType::Custom(_) => ash::vk::MemoryPropertyFlags::DEVICE_LOCAL,
        };
        for (i, mem_type) in self.memory_properties.memory_types.iter().enumerate() {
            let bit_set = (type_filter & (1 << i)) != 0;
            if bit_set && mem_type.property_flags.contains(wanted) {
                return Ok(i as u32);
            }
        }
        Err(AllocError::NotSupported("no matching Vulkan memory type for requested heap type"))
    }

    fn create_buffer(&self, desc: &ResourceDesc) -> Result<ash::vk::Buffer> {
        let buffer_info = ash::vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(
                ash::vk::BufferUsageFlags::STORAGE_BUFFER
                    | ash::vk::BufferUsageFlags::TRANSFER_SRC
                    | ash::vk::BufferUsageFlags::TRANSFER_DST,
            )
            .sharing_mode(ash::vk::SharingMode::EXCLUSIVE);
        unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(|_| AllocError::OutOfDeviceMemory)
        }
    }
}

impl Rhi for VulkanRhi {
    type Heap = VulkanHeap;
    type Resource = VulkanResource;

    fn create_heap(&self, size: u64, heap_type: HeapType) -> Result<Self::Heap> {
        // Vulkan has no raw-heap concept separate from a memory type, so a
        // block's "heap" here is a single `vkAllocateMemory` call covering
        // the whole block, matching how the original treats a NormalBlock
        // as one underlying device allocation.
        let type_index = self.memory_type_index(u32::MAX, heap_type)?;
        let alloc_info = ash::vk::MemoryAllocateInfo::builder()
            .allocation_size(size)
            .memory_type_index(type_index);
        let memory = unsafe {
            self.device
                .allocate_memory(&alloc_info, None)
                .map_err(|_| AllocError::OutOfDeviceMemory)?
        };
        Ok(VulkanHeap { memory, size, device: self.device.clone() })
    }

    fn create_placed(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource> {
        let buffer = self.create_buffer(desc)?;
        unsafe {
            self.device
                .bind_buffer_memory(buffer, heap.memory, offset)
                .map_err(|_| AllocError::InvalidArgument("failed to bind placed buffer memory"))?;
        }
        Ok(VulkanResource { buffer, dedicated_memory: None, device: self.device.clone() })
    }

    fn create_committed(&self, desc: &ResourceDesc) -> Result<Self::Resource> {
        let buffer = self.create_buffer(desc)?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let type_index = self.memory_type_index(requirements.memory_type_bits, desc.heap_type)?;
        let alloc_info = ash::vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);
        let memory = unsafe {
            self.device.allocate_memory(&alloc_info, None).map_err(|_| {
                unsafe { self.device.destroy_buffer(buffer, None) };
                AllocError::OutOfDeviceMemory
            })?
        };
        unsafe {
            self.device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(|_| AllocError::InvalidArgument("failed to bind committed buffer memory"))?;
        }
        Ok(VulkanResource { buffer, dedicated_memory: Some(memory), device: self.device.clone() })
    }

    fn create_aliasing(&self, heap: &Self::Heap, offset: u64, desc: &ResourceDesc) -> Result<Self::Resource> {
        self.create_placed(heap, offset, desc)
    }

    fn query_memory_capacity(&self, group: MemorySegmentGroup) -> (u64, u64) {
        let wanted_local = matches!(group, MemorySegmentGroup::Local);
        let mut capacity = 0u64;
        for heap in self.memory_properties.memory_heaps.iter() {
            let is_device_local = heap.flags.contains(ash::vk::MemoryHeapFlags::DEVICE_LOCAL);
            if is_device_local == wanted_local {
                capacity += heap.size;
            }
        }
        // Actual usage requires VK_EXT_memory_budget; callers without it
        // enabled only get capacity, which still lets the budget tracker
        // enforce soft/hard limits configured by the caller.
        (capacity, 0)
    }

    fn caps(&self) -> AllocatorCaps {
        AllocatorCaps {
            is_uma: self.memory_properties.memory_heaps.len() == 1,
            is_cache_coherent_uma: false,
            is_gpu_upload_heap_supported: true,
            is_tight_alignment_supported: true,
        }
    }
}
