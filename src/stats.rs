//! Aggregate statistics across segment groups, and the JSON dump format
//!.

use crate::budget::{Budget, BudgetTracker};
use crate::metadata::{DetailedStatistics, Statistics, Suballocation, SuballocationType};
use crate::rhi::MemorySegmentGroup;
use crate::util::json::JsonWriter;

/// Allocator-wide statistics: one `DetailedStatistics` per memory type
/// (here, collapsed to the two segment groups since `gpuma` doesn't model
/// per-heap-type detail beyond that), the two per-segment-group totals, and
/// a grand total.
#[derive(Debug, Clone, Default)]
pub struct TotalStatistics {
    pub local: DetailedStatistics,
    pub non_local: DetailedStatistics,
    pub total: DetailedStatistics,
}

impl TotalStatistics {
    pub fn add(&mut self, group: MemorySegmentGroup, stats: &DetailedStatistics) {
        match group {
            MemorySegmentGroup::Local => self.local.fold(stats),
            MemorySegmentGroup::NonLocal => self.non_local.fold(stats),
        }
        self.total.fold(stats);
    }
}

fn suballocation_type_name(ty: SuballocationType) -> &'static str {
    match ty {
        SuballocationType::Free => "FREE",
        SuballocationType::Unknown => "UNKNOWN",
        SuballocationType::Buffer => "BUFFER",
        SuballocationType::Texture1D => "TEXTURE1D",
        SuballocationType::Texture2D => "TEXTURE2D",
        SuballocationType::Texture3D => "TEXTURE3D",
    }
}

fn write_suballocations(w: &mut JsonWriter, subs: &[Suballocation]) {
    w.write_key("Suballocations");
    w.begin_array();
    for s in subs {
        w.begin_object();
        w.field_u64("Offset", s.offset);
        w.field_str("Type", suballocation_type_name(s.ty));
        w.field_u64("Size", s.size);
        w.end_object();
    }
    w.end_array();
}

/// Write one `DetailedStatistics` as `{TotalBytes, UnusedBytes, Allocations,
/// UnusedRanges, [size extrema,] [Suballocations]}`. `subs`, when given,
/// is only the offset/size/type that survive past an `Allocation` handoff
/// — usage, custom data, name, and layout aren't retained by a pool once
/// the caller owns the `Allocation` record (see DESIGN.md Open Questions).
fn write_detailed_statistics(w: &mut JsonWriter, stats: &DetailedStatistics, subs: Option<&[Suballocation]>) {
    w.begin_object();
    w.field_u64("TotalBytes", stats.stats.block_bytes);
    w.field_u64("UnusedBytes", stats.stats.block_bytes.saturating_sub(stats.stats.allocation_bytes));
    w.field_u64("Allocations", stats.stats.allocation_count);
    w.field_u64("UnusedRanges", stats.unused_range_count);
    if stats.stats.allocation_count > 0 {
        w.field_u64("AllocationSizeMin", stats.allocation_size_min);
        w.field_u64("AllocationSizeMax", stats.allocation_size_max);
    }
    if stats.unused_range_count > 0 {
        w.field_u64("UnusedRangeSizeMin", stats.unused_range_size_min);
        w.field_u64("UnusedRangeSizeMax", stats.unused_range_size_max);
    }
    if let Some(subs) = subs {
        write_suballocations(w, subs);
    }
    w.end_object();
}

fn write_budget(w: &mut JsonWriter, budget: &Budget) {
    w.begin_object();
    w.field_u64("BlockBytes", budget.block_bytes);
    w.field_u64("AllocationBytes", budget.allocation_bytes);
    w.field_u64("Usage", budget.usage);
    w.field_u64("Budget", budget.budget);
    w.end_object();
}

fn write_document(
    stats: &TotalStatistics,
    budget_tracker: &BudgetTracker,
    local_subs: Option<&[Suballocation]>,
    non_local_subs: Option<&[Suballocation]>,
) -> String {
    let mut w = JsonWriter::new();
    w.begin_object();

    let total_subs: Option<Vec<Suballocation>> = match (local_subs, non_local_subs) {
        (None, None) => None,
        (l, n) => Some(l.unwrap_or(&[]).iter().chain(n.unwrap_or(&[]).iter()).copied().collect()),
    };
    w.write_key("Total");
    write_detailed_statistics(&mut w, &stats.total, total_subs.as_deref());

    w.write_key("MemorySegmentGroups");
    w.begin_object();
    w.write_key("Local");
    write_detailed_statistics(&mut w, &stats.local, local_subs);
    w.write_key("NonLocal");
    write_detailed_statistics(&mut w, &stats.non_local, non_local_subs);
    w.end_object();

    w.write_key("Budget");
    w.begin_object();
    w.write_key("Local");
    write_budget(&mut w, &budget_tracker.get_budget(MemorySegmentGroup::Local));
    w.write_key("NonLocal");
    write_budget(&mut w, &budget_tracker.get_budget(MemorySegmentGroup::NonLocal));
    w.end_object();

    w.end_object();
    w.finish()
}

/// Render full statistics plus current budgets as JSON
/// (`Allocator::BuildStatsString`), without the per-suballocation arrays.
pub fn build_stats_string(stats: &TotalStatistics, budget_tracker: &BudgetTracker, detailed: bool) -> String {
    let _ = detailed; // callers that want the full per-suballocation dump use `build_detailed_stats_string`.
    write_document(stats, budget_tracker, None, None)
}

/// Same document as [`build_stats_string`], but with a `Suballocations`
/// array attached to `Total` and to each segment group.
pub fn build_detailed_stats_string(
    stats: &TotalStatistics,
    budget_tracker: &BudgetTracker,
    local_subs: &[Suballocation],
    non_local_subs: &[Suballocation],
) -> String {
    write_document(stats, budget_tracker, Some(local_subs), Some(non_local_subs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::AllocHandle;

    #[test]
    fn folds_into_correct_segment_group() {
        let mut total = TotalStatistics::default();
        let mut local_stats = DetailedStatistics::default();
        local_stats.add_allocation(1024);
        total.add(MemorySegmentGroup::Local, &local_stats);
        assert_eq!(total.local.stats.allocation_count, 1);
        assert_eq!(total.non_local.stats.allocation_count, 0);
        assert_eq!(total.total.stats.allocation_count, 1);
    }

    #[test]
    fn build_stats_string_is_well_formed_json_object() {
        let stats = TotalStatistics::default();
        let tracker = BudgetTracker::new();
        let json = build_stats_string(&stats, &tracker, true);
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
        assert!(json.contains("\"Total\""));
        assert!(json.contains("\"MemorySegmentGroups\""));
        assert!(json.contains("\"TotalBytes\""));
        assert!(!json.contains("\"Suballocations\""));
    }

    #[test]
    fn detailed_variant_attaches_suballocations_per_group() {
        let mut stats = TotalStatistics::default();
        stats.local.stats.block_bytes = 1024;
        stats.local.add_allocation(256);
        stats.total.stats.block_bytes = 1024;
        stats.total.add_allocation(256);
        let tracker = BudgetTracker::new();
        let local = vec![Suballocation { offset: 0, size: 256, ty: SuballocationType::Buffer, handle: AllocHandle::from_raw(1) }];
        let json = build_detailed_stats_string(&stats, &tracker, &local, &[]);
        assert!(json.contains("\"Suballocations\""));
        assert!(json.contains("\"Type\":\"BUFFER\""));
    }
}
