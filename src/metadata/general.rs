//! General-purpose block metadata: a free-list suballocator supporting
//! every placement strategy, coalescing, and the full enumeration surface
//! defragmentation needs.
//!
//! The internal index structure isn't dictated by any contract here, so
//! this implementation keeps it simple: a single vector of ranges sorted
//! by offset — free and allocated alike — scanned linearly for candidates.
//! A size-class bucketed index (TLSF-style) would cut placement from O(n)
//! to near O(1) if block occupancy ever gets large enough for that to
//! matter.

use crate::flags::AllocationStrategy;
use crate::handle::AllocHandle;
use crate::metadata::{AlgorithmData, AllocationRequest, BlockMetadata, Suballocation, SuballocationType};
use crate::util::bitscan::size_class;
use crate::util::layout::align_up_u64;
use crate::util::vector::PodVector;

#[cfg(feature = "debug-margin")]
const DEBUG_MARGIN: u64 = 16;
#[cfg(not(feature = "debug-margin"))]
const DEBUG_MARGIN: u64 = 0;

#[derive(Debug, Clone, Copy)]
struct Range {
    offset: u64,
    size: u64,
    ty: SuballocationType,
    private_data: u64,
}

impl Range {
    fn is_free(&self) -> bool {
        self.ty == SuballocationType::Free
    }
}

/// TLSF-style general-purpose block metadata.
pub struct BlockMetadataGeneral {
    size: u64,
    is_virtual: bool,
    ranges: PodVector<Range>,
    sum_free_size: u64,
}

impl BlockMetadataGeneral {
    pub fn new(size: u64, is_virtual: bool) -> Self {
        Self {
            size,
            is_virtual,
            ranges: vec![Range { offset: 0, size, ty: SuballocationType::Free, private_data: 0 }].into(),
            sum_free_size: size,
        }
    }

    /// Bitmap of size classes with at least one free range, recomputed on
    /// demand rather than maintained incrementally — cheap relative to the
    /// linear scan it guards and immune to staleness across direct `ranges`
    /// mutation in tests.
    fn free_size_class_bitmap(&self) -> u64 {
        let mut bitmap = 0u64;
        for r in self.ranges.iter().filter(|r| r.is_free()) {
            bitmap |= 1u64 << size_class(r.size);
        }
        bitmap
    }

    fn find_index_by_offset(&self, offset: u64) -> Option<usize> {
        self.ranges.binary_search_by_key(&offset, |r| r.offset).ok()
    }

    /// Candidate fitting offsets within free ranges, each paired with the
    /// index of the free range it was carved from and the waste (bytes
    /// consumed by alignment/debug margin beyond what's strictly needed) —
    /// used by the best-fit strategy.
    fn candidates(&self, size: u64, alignment: u64, upper_address: bool) -> Vec<(usize, u64, u64)> {
        let mut out = Vec::new();
        for (i, r) in self.ranges.iter().enumerate() {
            if !r.is_free() || r.size < size {
                continue;
            }
            let offset = if upper_address {
                if r.size < size + DEBUG_MARGIN {
                    continue;
                }
                let candidate = r.offset + r.size - size;
                candidate & !(alignment - 1)
            } else {
                align_up_u64(r.offset, alignment)
            };
            if offset < r.offset {
                continue;
            }
            let end = match offset.checked_add(size) {
                Some(e) => e,
                None => continue,
            };
            if end + DEBUG_MARGIN > r.offset + r.size {
                continue;
            }
            let waste = r.size - size;
            out.push((i, offset, waste));
        }
        out
    }

    fn coalesce_around(&mut self, idx: usize) {
        // Merge with the next range if it's also free.
        if idx + 1 < self.ranges.len() && self.ranges[idx + 1].is_free() {
            let next = self.ranges.remove(idx + 1);
            self.ranges[idx].size += next.size;
        }
        // Merge with the previous range if it's also free.
        if idx > 0 && self.ranges[idx - 1].is_free() {
            let merged_size = self.ranges[idx - 1].size + self.ranges[idx].size;
            self.ranges[idx - 1].size = merged_size;
            self.ranges.remove(idx);
        }
    }
}

impl BlockMetadata for BlockMetadataGeneral {
    fn size(&self) -> u64 {
        self.size
    }

    fn sum_free_size(&self) -> u64 {
        self.sum_free_size
    }

    fn allocation_count(&self) -> usize {
        self.ranges.iter().filter(|r| !r.is_free()).count()
    }

    fn free_regions_count(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_free()).count()
    }

    fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    fn allocation_offset(&self, handle: AllocHandle) -> u64 {
        handle.raw() - 1
    }

    fn allocation_info(&self, handle: AllocHandle) -> Option<Suballocation> {
        let offset = handle.raw().checked_sub(1)?;
        let idx = self.find_index_by_offset(offset)?;
        let r = &self.ranges[idx];
        if r.is_free() {
            return None;
        }
        Some(Suballocation { offset: r.offset, size: r.size, ty: r.ty, handle })
    }

    fn create_allocation_request(
        &self,
        size: u64,
        alignment: u64,
        upper_address: bool,
        strategy: AllocationStrategy,
    ) -> Option<AllocationRequest> {
        if size == 0 || alignment == 0 {
            return None;
        }
        let wanted_classes_and_up = !0u64 << size_class(size);
        if self.free_size_class_bitmap() & wanted_classes_and_up == 0 {
            return None;
        }
        let candidates = self.candidates(size, alignment, upper_address);
        let chosen = match strategy {
            AllocationStrategy::MinTime => candidates.first().copied(),
            AllocationStrategy::MinMemory => candidates.iter().copied().min_by_key(|c| (c.2, c.1)),
            AllocationStrategy::MinOffset => candidates.iter().copied().min_by_key(|c| c.1),
        }?;
        Some(AllocationRequest { offset: chosen.1, size, algorithm_data: AlgorithmData::General })
    }

    fn alloc(&mut self, request: AllocationRequest, ty: SuballocationType, private_data: u64) -> AllocHandle {
        debug_assert!(matches!(request.algorithm_data, AlgorithmData::General));
        let idx = self
            .ranges
            .iter()
            .position(|r| r.is_free() && r.offset <= request.offset && request.offset + request.size <= r.offset + r.size)
            .expect("committed request no longer fits any free range — metadata mutated between planning and commit");
        let free_range = self.ranges[idx];
        let leading = request.offset - free_range.offset;
        let trailing = (free_range.offset + free_range.size) - (request.offset + request.size);

        let mut replacement = Vec::with_capacity(3);
        if leading > 0 {
            replacement.push(Range { offset: free_range.offset, size: leading, ty: SuballocationType::Free, private_data: 0 });
        }
        replacement.push(Range { offset: request.offset, size: request.size, ty, private_data });
        if trailing > 0 {
            replacement.push(Range {
                offset: request.offset + request.size,
                size: trailing,
                ty: SuballocationType::Free,
                private_data: 0,
            });
        }
        self.ranges.splice(idx..idx + 1, replacement);
        self.sum_free_size -= request.size;
        AllocHandle::from_raw(request.offset + 1)
    }

    fn free(&mut self, handle: AllocHandle) {
        let offset = match handle.raw().checked_sub(1) {
            Some(o) => o,
            None => return,
        };
        let idx = self.find_index_by_offset(offset).expect("freed handle does not correspond to a live suballocation");
        assert!(!self.ranges[idx].is_free(), "double free of handle");
        self.sum_free_size += self.ranges[idx].size;
        self.ranges[idx].ty = SuballocationType::Free;
        self.ranges[idx].private_data = 0;
        self.coalesce_around(idx);
    }

    fn clear(&mut self) {
        self.ranges = vec![Range { offset: 0, size: self.size, ty: SuballocationType::Free, private_data: 0 }].into();
        self.sum_free_size = self.size;
    }

    fn validate(&self) -> bool {
        let mut prev_end = 0u64;
        let mut total_live = 0u64;
        for (i, r) in self.ranges.iter().enumerate() {
            if r.offset != prev_end {
                return false;
            }
            if i > 0 && r.is_free() && self.ranges[i - 1].is_free() {
                return false; // adjacent free ranges should have been coalesced
            }
            if !r.is_free() {
                total_live += r.size;
            }
            prev_end = r.offset + r.size;
        }
        prev_end == self.size && self.sum_free_size == self.size - total_live
    }

    fn begin_alloc_enum(&self) -> Vec<Suballocation> {
        self.ranges
            .iter()
            .map(|r| Suballocation { offset: r.offset, size: r.size, ty: r.ty, handle: AllocHandle::from_raw(r.offset + 1) })
            .collect()
    }

    fn allocation_private_data(&self, handle: AllocHandle) -> u64 {
        let offset = handle.raw().saturating_sub(1);
        self.find_index_by_offset(offset).map(|i| self.ranges[i].private_data).unwrap_or(0)
    }

    fn set_allocation_private_data(&mut self, handle: AllocHandle, private_data: u64) {
        let offset = handle.raw().saturating_sub(1);
        if let Some(i) = self.find_index_by_offset(offset) {
            self.ranges[i].private_data = private_data;
        }
    }

    fn supports_defragmentation(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_holes(size: u64, holes: &[(u64, u64)]) -> BlockMetadataGeneral {
        let mut meta = BlockMetadataGeneral::new(size, false);
        meta.ranges.clear();
        let mut offset = 0;
        for &(start, end) in holes {
            if offset < start {
                meta.ranges.push(Range { offset, size: start - offset, ty: SuballocationType::Buffer, private_data: 0 });
            }
            meta.ranges.push(Range { offset: start, size: end - start, ty: SuballocationType::Free, private_data: 0 });
            offset = end;
        }
        if offset < size {
            meta.ranges.push(Range { offset, size: size - offset, ty: SuballocationType::Buffer, private_data: 0 });
        }
        meta.sum_free_size = meta.ranges.iter().filter(|r| r.is_free()).map(|r| r.size).sum();
        meta
    }

    #[test]
    fn best_fit_vs_first_fit() {
        let meta = with_holes(1024, &[(0, 128), (128, 512), (768, 1024)]);
        let req = meta.create_allocation_request(128, 1, false, AllocationStrategy::MinMemory).unwrap();
        assert_eq!(req.offset, 0);
        let req = meta.create_allocation_request(128, 1, false, AllocationStrategy::MinTime).unwrap();
        assert_eq!(req.offset, 0);
    }

    #[test]
    fn best_fit_prefers_tighter_hole() {
        let mut meta = BlockMetadataGeneral::new(1024, false);
        meta.ranges = vec![
            Range { offset: 0, size: 256, ty: SuballocationType::Free, private_data: 0 },
            Range { offset: 256, size: 120, ty: SuballocationType::Free, private_data: 0 },
            Range { offset: 376, size: 648, ty: SuballocationType::Buffer, private_data: 0 },
        ]
        .into();
        meta.sum_free_size = 376;
        let req = meta.create_allocation_request(120, 1, false, AllocationStrategy::MinMemory).unwrap();
        assert_eq!(req.offset, 256);
    }

    #[test]
    fn size_class_bitmap_rejects_requests_too_large_for_any_free_range() {
        let meta = with_holes(1024, &[(0, 64)]);
        assert!(meta.create_allocation_request(128, 1, false, AllocationStrategy::MinTime).is_none());
        assert!(meta.create_allocation_request(64, 1, false, AllocationStrategy::MinTime).is_some());
    }

    #[test]
    fn free_coalesces_adjacent_ranges() {
        let mut meta = BlockMetadataGeneral::new(1024, false);
        let req_a = meta.create_allocation_request(256, 1, false, AllocationStrategy::MinTime).unwrap();
        let a = meta.alloc(req_a, SuballocationType::Buffer, 0);
        let req_b = meta.create_allocation_request(256, 1, false, AllocationStrategy::MinTime).unwrap();
        let b = meta.alloc(req_b, SuballocationType::Buffer, 0);
        meta.free(a);
        meta.free(b);
        assert_eq!(meta.free_regions_count(), 1);
        assert_eq!(meta.sum_free_size(), 1024);
    }

    #[test]
    fn validate_after_alloc_and_free() {
        let mut meta = BlockMetadataGeneral::new(1024, false);
        let req = meta.create_allocation_request(400, 16, false, AllocationStrategy::MinTime).unwrap();
        let h = meta.alloc(req, SuballocationType::Buffer, 0);
        assert!(meta.validate());
        meta.free(h);
        assert!(meta.validate());
        assert_eq!(meta.allocation_count(), 0);
    }
}
