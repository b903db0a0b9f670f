//! Throughput of the linear (ring-buffer) block metadata under the
//! allocate/free patterns it's actually built for: append-only growth and
//! steady-state ring reuse.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gpuma::flags::AllocationStrategy;
use gpuma::metadata::linear::BlockMetadataLinear;
use gpuma::metadata::{BlockMetadata, SuballocationType};

const BLOCK_SIZE: u64 = 64 * 1024 * 1024;
const ALLOC_SIZE: u64 = 256;

fn bench_append_only(c: &mut Criterion) {
    c.bench_function("linear_append_1000x256B", |b| {
        b.iter(|| {
            let mut metadata = BlockMetadataLinear::new(BLOCK_SIZE, false);
            for _ in 0..1000 {
                let req = metadata.create_allocation_request(ALLOC_SIZE, 16, false, AllocationStrategy::MinTime).unwrap();
                black_box(metadata.alloc(req, SuballocationType::Buffer, 0));
            }
        });
    });
}

fn bench_ring_buffer_steady_state(c: &mut Criterion) {
    c.bench_function("linear_ring_buffer_steady_state", |b| {
        let mut metadata = BlockMetadataLinear::new(BLOCK_SIZE, false);
        let mut live = Vec::new();
        for _ in 0..64 {
            let req = metadata.create_allocation_request(ALLOC_SIZE, 16, false, AllocationStrategy::MinTime).unwrap();
            live.push(metadata.alloc(req, SuballocationType::Buffer, 0));
        }
        b.iter(|| {
            let oldest = live.remove(0);
            metadata.free(oldest);
            let req = metadata.create_allocation_request(ALLOC_SIZE, 16, false, AllocationStrategy::MinTime).unwrap();
            live.push(black_box(metadata.alloc(req, SuballocationType::Buffer, 0)));
        });
    });
}

criterion_group!(benches, bench_append_only, bench_ring_buffer_steady_state);
criterion_main!(benches);
