//! Linear block metadata: append-only, ring-buffer, double-stack, and
//! upper-address placement over a single contiguous range.
//!
//! Two suballocation vectors (`1st`/`2nd`, with the physical storage
//! swapped in place rather than copied when `1st` drains and `2nd` is in
//! ring-buffer mode), three null-item counters, and a `2nd`-vector mode
//! tag. Defragmentation enumeration is unsupported — linear layouts have
//! no stable per-allocation index to enumerate against, so this panics
//! rather than returning an empty or misleading list.

use crate::flags::AllocationStrategy;
use crate::handle::AllocHandle;
use crate::metadata::{AlgorithmData, AllocationRequest, BlockMetadata, DetailedStatistics, Statistics, Suballocation, SuballocationType};
use crate::util::layout::align_up_u64;
use crate::util::search::{binary_find_sorted, binary_find_sorted_desc};
use crate::util::vector::PodVector;

#[cfg(feature = "debug-margin")]
const DEBUG_MARGIN: u64 = 16;
#[cfg(not(feature = "debug-margin"))]
const DEBUG_MARGIN: u64 = 0;

/// Which of the three placement cases a committed request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearAllocTag {
    UpperAddress,
    EndOf1st,
    EndOf2nd,
}

/// The metadata-private plan threaded from `create_allocation_request` to `alloc`.
#[derive(Debug, Clone, Copy)]
pub struct LinearAllocRequest {
    pub(crate) tag: LinearAllocTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecondVectorMode {
    Empty,
    RingBuffer,
    DoubleStack,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u64,
    size: u64,
    ty: SuballocationType,
    private_data: u64,
}

impl Entry {
    fn is_free(&self) -> bool {
        self.ty == SuballocationType::Free
    }

    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Linear (ring-buffer / double-stack / upper-address) block metadata.
pub struct BlockMetadataLinear {
    size: u64,
    is_virtual: bool,
    sum_free_size: u64,
    vector0: PodVector<Entry>,
    vector1: PodVector<Entry>,
    first_vector_index: u8,
    second_vector_mode: SecondVectorMode,
    null_items_1st_begin: usize,
    null_items_1st_middle: usize,
    null_items_2nd: usize,
}

impl BlockMetadataLinear {
    pub fn new(size: u64, is_virtual: bool) -> Self {
        Self {
            size,
            is_virtual,
            sum_free_size: size,
            vector0: PodVector::new(),
            vector1: PodVector::new(),
            first_vector_index: 0,
            second_vector_mode: SecondVectorMode::Empty,
            null_items_1st_begin: 0,
            null_items_1st_middle: 0,
            null_items_2nd: 0,
        }
    }

    fn suballoc_1st(&self) -> &PodVector<Entry> {
        if self.first_vector_index == 0 { &self.vector0 } else { &self.vector1 }
    }

    fn suballoc_1st_mut(&mut self) -> &mut PodVector<Entry> {
        if self.first_vector_index == 0 { &mut self.vector0 } else { &mut self.vector1 }
    }

    fn suballoc_2nd(&self) -> &PodVector<Entry> {
        if self.first_vector_index == 0 { &self.vector1 } else { &self.vector0 }
    }

    fn suballoc_2nd_mut(&mut self) -> &mut PodVector<Entry> {
        if self.first_vector_index == 0 { &mut self.vector1 } else { &mut self.vector0 }
    }

    fn should_compact_1st(&self) -> bool {
        let suballoc_count = self.suballoc_1st().len();
        let null_item_count = self.null_items_1st_begin + self.null_items_1st_middle;
        suballoc_count > 32 && null_item_count * 2 >= (suballoc_count - null_item_count) * 3
    }

    fn compact_1st(&mut self) {
        let begin = self.null_items_1st_begin;
        let old = std::mem::take(self.suballoc_1st_mut());
        let live: PodVector<Entry> = old.into_iter().skip(begin).filter(|e| !e.is_free()).collect();
        *self.suballoc_1st_mut() = live;
        self.null_items_1st_begin = 0;
        self.null_items_1st_middle = 0;
    }

    fn cleanup_after_free(&mut self) {
        if self.sum_free_size == self.size {
            self.vector0.clear();
            self.vector1.clear();
            self.null_items_1st_begin = 0;
            self.null_items_1st_middle = 0;
            self.null_items_2nd = 0;
            self.second_vector_mode = SecondVectorMode::Empty;
            return;
        }

        // Trim leading nulls from 1st.
        {
            let vec = self.suballoc_1st();
            let mut i = self.null_items_1st_begin;
            while i < vec.len() && vec[i].is_free() {
                i += 1;
            }
            let trimmed = i - self.null_items_1st_begin;
            self.null_items_1st_middle = self.null_items_1st_middle.saturating_sub(trimmed);
            self.null_items_1st_begin = i;
        }
        // Trim trailing nulls from 1st.
        while self.null_items_1st_middle > 0 {
            let begin = self.null_items_1st_begin;
            let vec = self.suballoc_1st();
            if vec.len() > begin && vec.last().is_some_and(Entry::is_free) {
                self.suballoc_1st_mut().pop();
                self.null_items_1st_middle -= 1;
            } else {
                break;
            }
        }
        // Trim trailing nulls from 2nd.
        while self.suballoc_2nd().last().is_some_and(Entry::is_free) {
            self.suballoc_2nd_mut().pop();
            self.null_items_2nd -= 1;
        }
        // Trim leading nulls from 2nd.
        while self.suballoc_2nd().first().is_some_and(Entry::is_free) {
            self.suballoc_2nd_mut().remove(0);
            self.null_items_2nd -= 1;
        }

        if self.should_compact_1st() {
            self.compact_1st();
        }

        if self.suballoc_2nd().is_empty() && self.second_vector_mode == SecondVectorMode::RingBuffer {
            self.second_vector_mode = SecondVectorMode::Empty;
        }

        let first_live_len = self.suballoc_1st().len() - self.null_items_1st_begin;
        if first_live_len == 0 {
            self.suballoc_1st_mut().clear();
            self.null_items_1st_begin = 0;
            self.null_items_1st_middle = 0;
            if self.second_vector_mode == SecondVectorMode::RingBuffer && !self.suballoc_2nd().is_empty() {
                let new_first = std::mem::take(self.suballoc_2nd_mut());
                let leading_free = new_first.iter().take_while(|e| e.is_free()).count();
                let new_middle = self.null_items_2nd - leading_free;
                self.null_items_2nd = 0;
                self.second_vector_mode = SecondVectorMode::Empty;
                self.first_vector_index ^= 1;
                *self.suballoc_1st_mut() = new_first;
                self.null_items_1st_begin = leading_free;
                self.null_items_1st_middle = new_middle;
            }
        }
    }

    fn request_lower_address(&self, size: u64, alignment: u64) -> Option<(u64, LinearAllocTag)> {
        // Branch A: place after the end of 1st (mode Empty or DoubleStack).
        if matches!(self.second_vector_mode, SecondVectorMode::Empty | SecondVectorMode::DoubleStack) {
            let base = match self.suballoc_1st().last() {
                Some(e) => align_up_u64(e.end() + DEBUG_MARGIN, alignment),
                None => 0,
            };
            let free_space_end = match self.second_vector_mode {
                SecondVectorMode::DoubleStack => self.suballoc_2nd().last().map(|e| e.offset).unwrap_or(self.size),
                _ => self.size,
            };
            if let Some(end) = base.checked_add(size).and_then(|v| v.checked_add(DEBUG_MARGIN)) {
                if end <= free_space_end {
                    return Some((base, LinearAllocTag::EndOf1st));
                }
            }
        }
        // Branch B: place after the end of 2nd (mode Empty or RingBuffer).
        // Only reached here if branch A failed, which in the Empty-mode case
        // implies 1st is already occupied (an empty block always succeeds
        // in branch A unless the request is larger than the whole block).
        if matches!(self.second_vector_mode, SecondVectorMode::Empty | SecondVectorMode::RingBuffer) {
            debug_assert!(
                !self.suballoc_1st().is_empty() || size > self.size,
                "branch B reached with an empty 1st vector and a fitting request"
            );
            let base = match self.suballoc_2nd().last() {
                Some(e) => align_up_u64(e.end() + DEBUG_MARGIN, alignment),
                None => 0,
            };
            let limit = if self.null_items_1st_begin < self.suballoc_1st().len() {
                self.suballoc_1st()[self.null_items_1st_begin].offset
            } else {
                self.size
            };
            if let Some(end) = base.checked_add(size).and_then(|v| v.checked_add(DEBUG_MARGIN)) {
                if end <= limit {
                    return Some((base, LinearAllocTag::EndOf2nd));
                }
            }
        }
        None
    }

    fn request_upper_address(&self, size: u64, alignment: u64) -> Option<(u64, LinearAllocTag)> {
        if self.second_vector_mode == SecondVectorMode::RingBuffer {
            return None;
        }
        let top = match self.suballoc_2nd().last() {
            Some(e) => e.offset,
            None => self.size,
        };
        if size > top {
            return None;
        }
        let mut base = top - size;
        if base < DEBUG_MARGIN {
            return None;
        }
        base -= DEBUG_MARGIN;
        base &= !(alignment - 1);
        let end_of_1st = self.suballoc_1st().last().map(Entry::end).unwrap_or(0);
        let required_floor = if end_of_1st == 0 { 0 } else { end_of_1st + DEBUG_MARGIN };
        if base >= required_floor {
            Some((base, LinearAllocTag::UpperAddress))
        } else {
            None
        }
    }
}

impl BlockMetadata for BlockMetadataLinear {
    fn size(&self) -> u64 {
        self.size
    }

    fn sum_free_size(&self) -> u64 {
        self.sum_free_size
    }

    fn allocation_count(&self) -> usize {
        self.suballoc_1st().len() - self.null_items_1st_begin - self.null_items_1st_middle + self.suballoc_2nd().len()
            - self.null_items_2nd
    }

    fn free_regions_count(&self) -> usize {
        unreachable!("linear block metadata does not track free regions as discrete ranges")
    }

    fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    fn allocation_offset(&self, handle: AllocHandle) -> u64 {
        handle.raw() - 1
    }

    fn allocation_info(&self, handle: AllocHandle) -> Option<Suballocation> {
        let offset = handle.raw().checked_sub(1)?;
        for e in self.suballoc_1st().iter().chain(self.suballoc_2nd().iter()) {
            if e.offset == offset && !e.is_free() {
                return Some(Suballocation { offset: e.offset, size: e.size, ty: e.ty, handle });
            }
        }
        None
    }

    fn create_allocation_request(
        &self,
        size: u64,
        alignment: u64,
        upper_address: bool,
        _strategy: AllocationStrategy,
    ) -> Option<AllocationRequest> {
        if size == 0 || alignment == 0 {
            return None;
        }
        let (offset, tag) = if upper_address {
            self.request_upper_address(size, alignment)?
        } else {
            self.request_lower_address(size, alignment)?
        };
        Some(AllocationRequest { offset, size, algorithm_data: AlgorithmData::Linear(LinearAllocRequest { tag }) })
    }

    fn alloc(&mut self, request: AllocationRequest, ty: SuballocationType, private_data: u64) -> AllocHandle {
        let tag = match request.algorithm_data {
            AlgorithmData::Linear(r) => r.tag,
            AlgorithmData::General => panic!("linear metadata received a request built by another variant"),
        };
        let entry = Entry { offset: request.offset, size: request.size, ty, private_data };
        match tag {
            LinearAllocTag::EndOf1st => {
                self.suballoc_1st_mut().push(entry);
            }
            LinearAllocTag::EndOf2nd => {
                if self.second_vector_mode == SecondVectorMode::Empty {
                    self.second_vector_mode = SecondVectorMode::RingBuffer;
                }
                assert_ne!(
                    self.second_vector_mode,
                    SecondVectorMode::DoubleStack,
                    "cannot place a ring-buffer allocation while 2nd vector is in double-stack mode"
                );
                self.suballoc_2nd_mut().push(entry);
            }
            LinearAllocTag::UpperAddress => {
                if self.second_vector_mode == SecondVectorMode::Empty {
                    self.second_vector_mode = SecondVectorMode::DoubleStack;
                }
                assert_ne!(
                    self.second_vector_mode,
                    SecondVectorMode::RingBuffer,
                    "cannot place an upper-address allocation while 2nd vector is in ring-buffer mode"
                );
                self.suballoc_2nd_mut().push(entry);
            }
        }
        self.sum_free_size -= request.size;
        AllocHandle::from_raw(request.offset + 1)
    }

    fn free(&mut self, handle: AllocHandle) {
        let offset = match handle.raw().checked_sub(1) {
            Some(o) => o,
            None => return,
        };

        // (a) fast path: first item of 1st.
        if let Some(first) = self.suballoc_1st().first() {
            if first.offset == offset {
                let size = first.size;
                let e = &mut self.suballoc_1st_mut()[0];
                e.ty = SuballocationType::Free;
                e.private_data = 0;
                self.null_items_1st_begin += 1;
                self.sum_free_size += size;
                self.cleanup_after_free();
                return;
            }
        }
        // (b) fast path: last item of 2nd, or last item of 1st if 2nd empty.
        if let Some(last) = self.suballoc_2nd().last() {
            if last.offset == offset {
                let size = last.size;
                self.suballoc_2nd_mut().pop();
                self.sum_free_size += size;
                self.cleanup_after_free();
                return;
            }
        } else if let Some(last) = self.suballoc_1st().last() {
            if last.offset == offset {
                let size = last.size;
                self.suballoc_1st_mut().pop();
                self.sum_free_size += size;
                self.cleanup_after_free();
                return;
            }
        }
        // (c) binary search in the middle of 1st.
        if let Some(idx) = binary_find_sorted(self.suballoc_1st(), offset, |e| e.offset) {
            let size = self.suballoc_1st()[idx].size;
            let e = &mut self.suballoc_1st_mut()[idx];
            e.ty = SuballocationType::Free;
            e.private_data = 0;
            self.null_items_1st_middle += 1;
            self.sum_free_size += size;
            self.cleanup_after_free();
            return;
        }
        // (d) binary search in 2nd, ascending (ring-buffer) or descending (double-stack).
        let idx = match self.second_vector_mode {
            SecondVectorMode::DoubleStack => binary_find_sorted_desc(self.suballoc_2nd(), offset, |e| e.offset),
            _ => binary_find_sorted(self.suballoc_2nd(), offset, |e| e.offset),
        };
        if let Some(idx) = idx {
            let size = self.suballoc_2nd()[idx].size;
            let e = &mut self.suballoc_2nd_mut()[idx];
            e.ty = SuballocationType::Free;
            e.private_data = 0;
            self.null_items_2nd += 1;
            self.sum_free_size += size;
            self.cleanup_after_free();
            return;
        }
        panic!("freed handle does not correspond to any live suballocation in this block");
    }

    fn clear(&mut self) {
        self.vector0.clear();
        self.vector1.clear();
        self.null_items_1st_begin = 0;
        self.null_items_1st_middle = 0;
        self.null_items_2nd = 0;
        self.sum_free_size = self.size;
        // Leaving first_vector_index unchanged — it doesn't matter.
        self.second_vector_mode = SecondVectorMode::Empty;
    }

    fn validate(&self) -> bool {
        let mut prev_end: Option<u64> = None;
        for e in self.suballoc_1st() {
            if let Some(p) = prev_end {
                if e.offset < p {
                    return false;
                }
            }
            prev_end = Some(e.end());
        }

        let mut total_live = 0u64;
        for e in self.suballoc_1st().iter().chain(self.suballoc_2nd().iter()) {
            if !e.is_free() {
                total_live += e.size;
            }
        }
        self.sum_free_size == self.size - total_live
    }

    fn begin_alloc_enum(&self) -> Vec<Suballocation> {
        unreachable!("linear block metadata does not support defragmentation/enumeration entry points")
    }

    fn enumerate_suballocations(&self) -> Vec<Suballocation> {
        // The 2nd vector runs in descending offset order under the
        // double-stack placement mode, so sort by offset rather than trust
        // vector order before walking gaps.
        let mut entries: Vec<&Entry> = self.suballoc_1st().iter().chain(self.suballoc_2nd().iter()).collect();
        entries.sort_by_key(|e| e.offset);

        let mut out = Vec::with_capacity(entries.len() + 1);
        let mut prev_end = 0u64;
        for e in entries {
            if e.offset > prev_end {
                out.push(Suballocation {
                    offset: prev_end,
                    size: e.offset - prev_end,
                    ty: SuballocationType::Free,
                    handle: AllocHandle::from_raw(prev_end + 1),
                });
            }
            out.push(Suballocation { offset: e.offset, size: e.size, ty: e.ty, handle: AllocHandle::from_raw(e.offset + 1) });
            prev_end = prev_end.max(e.end());
        }
        if prev_end < self.size {
            out.push(Suballocation {
                offset: prev_end,
                size: self.size - prev_end,
                ty: SuballocationType::Free,
                handle: AllocHandle::from_raw(prev_end + 1),
            });
        }
        out
    }

    fn allocation_private_data(&self, handle: AllocHandle) -> u64 {
        let offset = handle.raw() - 1;
        self.suballoc_1st()
            .iter()
            .chain(self.suballoc_2nd().iter())
            .find(|e| e.offset == offset && !e.is_free())
            .map(|e| e.private_data)
            .unwrap_or(0)
    }

    fn set_allocation_private_data(&mut self, handle: AllocHandle, private_data: u64) {
        let offset = handle.raw() - 1;
        for e in self.suballoc_1st_mut().iter_mut() {
            if e.offset == offset && !e.is_free() {
                e.private_data = private_data;
                return;
            }
        }
        for e in self.suballoc_2nd_mut().iter_mut() {
            if e.offset == offset && !e.is_free() {
                e.private_data = private_data;
                return;
            }
        }
    }

    fn add_statistics(&self, stats: &mut Statistics) {
        stats.block_count += 1;
        stats.block_bytes += self.size;
        stats.allocation_count += self.allocation_count() as u64;
        stats.allocation_bytes += self.size - self.sum_free_size;
    }

    fn add_detailed_statistics(&self, stats: &mut DetailedStatistics) {
        stats.stats.block_count += 1;
        stats.stats.block_bytes += self.size;
        let mut prev_end = 0u64;
        for e in self.suballoc_1st().iter().chain(self.suballoc_2nd().iter()) {
            if e.offset > prev_end {
                stats.add_unused_range(e.offset - prev_end);
            }
            if !e.is_free() {
                stats.add_allocation(e.size);
            } else {
                stats.add_unused_range(e.size);
            }
            prev_end = e.end();
        }
        if prev_end < self.size {
            stats.add_unused_range(self.size - prev_end);
        }
    }

    fn supports_defragmentation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(meta: &mut BlockMetadataLinear, size: u64, align: u64, upper: bool) -> (AllocHandle, u64) {
        let req = meta
            .create_allocation_request(size, align, upper, AllocationStrategy::MinTime)
            .expect("allocation should succeed");
        let offset = req.offset;
        let h = meta.alloc(req, SuballocationType::Buffer, 0);
        (h, offset)
    }

    #[test]
    fn scenario_ring_buffer() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        let (a, off_a) = alloc(&mut meta, 256, 256, false);
        assert_eq!(off_a, 0);
        let (_b, off_b) = alloc(&mut meta, 256, 256, false);
        assert_eq!(off_b, 256);
        meta.free(a);
        let (_c, off_c) = alloc(&mut meta, 256, 256, false);
        assert_eq!(off_c, 0);
        assert_eq!(meta.second_vector_mode, SecondVectorMode::RingBuffer);
    }

    #[test]
    fn scenario_double_stack() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        let (u, off_u) = alloc(&mut meta, 256, 1, true);
        assert_eq!(off_u, 768);
        assert_eq!(meta.second_vector_mode, SecondVectorMode::DoubleStack);
        let (_l, off_l) = alloc(&mut meta, 256, 1, false);
        assert_eq!(off_l, 0);
        meta.free(u);
        let (_u2, off_u2) = alloc(&mut meta, 128, 1, true);
        assert_eq!(off_u2, 896);
    }

    #[test]
    fn alloc_then_free_restores_free_size() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        let (h, _) = alloc(&mut meta, 100, 1, false);
        assert_eq!(meta.sum_free_size(), 924);
        meta.free(h);
        assert_eq!(meta.sum_free_size(), 1024);
        assert_eq!(meta.allocation_count(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        alloc(&mut meta, 100, 1, false);
        alloc(&mut meta, 50, 1, false);
        meta.clear();
        assert_eq!(meta.allocation_count(), 0);
        assert_eq!(meta.sum_free_size(), 1024);
    }

    #[test]
    #[should_panic(expected = "does not support defragmentation")]
    fn enumeration_is_unsupported() {
        let meta = BlockMetadataLinear::new(1024, false);
        meta.begin_alloc_enum();
    }

    #[test]
    fn enumerate_suballocations_covers_the_whole_block_without_panicking() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        alloc(&mut meta, 100, 1, false);
        alloc(&mut meta, 50, 1, true);
        let subs = meta.enumerate_suballocations();
        let total: u64 = subs.iter().map(|s| s.size).sum();
        assert_eq!(total, 1024);
        let live: u64 = subs.iter().filter(|s| s.ty != SuballocationType::Free).map(|s| s.size).sum();
        assert_eq!(live, 150);
    }

    #[test]
    fn validate_holds_after_several_ops() {
        let mut meta = BlockMetadataLinear::new(1024, false);
        let (a, _) = alloc(&mut meta, 128, 1, false);
        let (_b, _) = alloc(&mut meta, 128, 1, false);
        assert!(meta.validate());
        meta.free(a);
        assert!(meta.validate());
    }
}
