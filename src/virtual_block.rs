//! Virtual blocks: CPU-only suballocation bookkeeping over a range with no
//! backing device memory.
//!
//! Thin enough that it's really just a `BlockMetadata` plus the descriptor
//! bookkeeping `Allocate`/`Free`/`GetAllocationInfo` need — no `Rhi`, no
//! heap, no budget tracking.

use crate::block::{new_metadata, Algorithm};
use crate::config::{VirtualAllocationDesc, VirtualAllocationInfo, VirtualBlockDesc};
use crate::error::{AllocError, Result};
use crate::flags::AllocationStrategy;
use crate::handle::AllocHandle;
use crate::metadata::{BlockMetadata, DetailedStatistics, Statistics, SuballocationType};
use crate::sync::Mutex;
use crate::util::json::JsonWriter;

/// A CPU-only address range suballocator.
pub struct VirtualBlock {
    metadata: Mutex<Box<dyn BlockMetadata + Send>>,
    size: u64,
}

impl VirtualBlock {
    pub fn new(desc: &VirtualBlockDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(AllocError::InvalidArgument("virtual block size must be nonzero"));
        }
        let algorithm = desc.algorithm();
        Ok(Self { metadata: Mutex::new(new_metadata(algorithm, desc.size, true)), size: desc.size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.lock().is_empty()
    }

    pub fn allocation_count(&self) -> usize {
        self.metadata.lock().allocation_count()
    }

    pub fn allocate(&self, desc: &VirtualAllocationDesc) -> Result<(AllocHandle, u64)> {
        if desc.size == 0 || desc.alignment == 0 {
            return Err(AllocError::InvalidArgument("virtual allocation size and alignment must be nonzero"));
        }
        let strategy = AllocationStrategy::from_virtual_flags(desc.flags);
        let upper_address = desc.flags.contains(crate::flags::VirtualAllocationFlags::UPPER_ADDRESS);
        let mut metadata = self.metadata.lock();
        let request = metadata
            .create_allocation_request(desc.size, desc.alignment, upper_address, strategy)
            .ok_or(AllocError::OutOfDeviceMemory)?;
        let handle = metadata.alloc(request, SuballocationType::Unknown, desc.private_data);
        let offset = metadata.allocation_offset(handle);
        Ok((handle, offset))
    }

    pub fn free(&self, handle: AllocHandle) {
        self.metadata.lock().free(handle);
    }

    pub fn clear(&self) {
        self.metadata.lock().clear();
    }

    pub fn get_allocation_info(&self, handle: AllocHandle) -> Option<VirtualAllocationInfo> {
        let metadata = self.metadata.lock();
        let sub = metadata.allocation_info(handle)?;
        Some(VirtualAllocationInfo { offset: sub.offset, size: sub.size, private_data: metadata.allocation_private_data(handle) })
    }

    pub fn set_allocation_private_data(&self, handle: AllocHandle, private_data: u64) {
        self.metadata.lock().set_allocation_private_data(handle, private_data);
    }

    pub fn calculate_statistics(&self) -> DetailedStatistics {
        let mut stats = DetailedStatistics::default();
        self.metadata.lock().add_detailed_statistics(&mut stats);
        stats
    }

    pub fn build_stats_string(&self) -> String {
        let metadata = self.metadata.lock();
        let mut plain = Statistics::default();
        metadata.add_statistics(&mut plain);
        let mut w = JsonWriter::new();
        w.begin_object();
        w.field_u64("BlockBytes", plain.block_bytes);
        w.field_u64("AllocationBytes", plain.allocation_bytes);
        w.field_u64("AllocationCount", plain.allocation_count);
        w.write_key("Suballocations");
        w.begin_array();
        for sub in metadata.enumerate_suballocations() {
            w.begin_object();
            w.field_u64("Offset", sub.offset);
            w.field_u64("Size", sub.size);
            w.end_object();
        }
        w.end_array();
        w.end_object();
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free_round_trip() {
        let block = VirtualBlock::new(&VirtualBlockDesc::new(1024)).unwrap();
        let (handle, offset) = block.allocate(&VirtualAllocationDesc::new(256)).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(block.allocation_count(), 1);
        let info = block.get_allocation_info(handle).unwrap();
        assert_eq!(info.size, 256);
        block.free(handle);
        assert!(block.is_empty());
    }

    #[test]
    fn clear_resets_to_fully_free() {
        let block = VirtualBlock::new(&VirtualBlockDesc::new(1024)).unwrap();
        block.allocate(&VirtualAllocationDesc::new(256)).unwrap();
        block.clear();
        assert!(block.is_empty());
        assert_eq!(block.calculate_statistics().stats.allocation_count, 0);
    }

    #[test]
    fn build_stats_string_is_valid_json_shape() {
        let block = VirtualBlock::new(&VirtualBlockDesc::new(1024)).unwrap();
        block.allocate(&VirtualAllocationDesc::new(128)).unwrap();
        let json = block.build_stats_string();
        assert!(json.contains("\"Suballocations\""));
    }
}
