//! Throughput of the general (TLSF-style) block metadata: best-fit
//! placement under fragmentation pressure, and the defragmentation
//! enumeration path it uniquely supports.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gpuma::flags::AllocationStrategy;
use gpuma::metadata::general::BlockMetadataGeneral;
use gpuma::metadata::{BlockMetadata, SuballocationType};

const BLOCK_SIZE: u64 = 64 * 1024 * 1024;

fn bench_best_fit_under_fragmentation(c: &mut Criterion) {
    c.bench_function("general_best_fit_1000x_mixed_sizes", |b| {
        b.iter(|| {
            let mut metadata = BlockMetadataGeneral::new(BLOCK_SIZE, false);
            let mut live = Vec::new();
            for i in 0..1000 {
                let size = 64 + (i % 7) * 128;
                let req = metadata.create_allocation_request(size, 16, false, AllocationStrategy::MinMemory).unwrap();
                live.push(metadata.alloc(req, SuballocationType::Buffer, 0));
                if i % 3 == 0 {
                    let handle = live.remove(live.len() / 2);
                    metadata.free(handle);
                }
            }
            black_box(live.len());
        });
    });
}

fn bench_allocation_enumeration(c: &mut Criterion) {
    c.bench_function("general_begin_alloc_enum_256_live", |b| {
        let mut metadata = BlockMetadataGeneral::new(BLOCK_SIZE, false);
        for _ in 0..256 {
            let req = metadata.create_allocation_request(4096, 256, false, AllocationStrategy::MinTime).unwrap();
            metadata.alloc(req, SuballocationType::Buffer, 0);
        }
        b.iter(|| black_box(metadata.begin_alloc_enum()));
    });
}

criterion_group!(benches, bench_best_fit_under_fragmentation, bench_allocation_enumeration);
criterion_main!(benches);
