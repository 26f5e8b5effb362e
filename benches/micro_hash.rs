//! Micro benchmarks for the extendible hash directory.
#![forbid(unsafe_code)]
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use pageindex::ExtendibleHash;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const KEY_COUNT: u64 = 65_536;

fn micro_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/hash");
    group.sample_size(30);

    for capacity in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(KEY_COUNT));
        group.bench_function(format!("insert/bucket_{capacity}"), |b| {
            b.iter_batched(
                || ExtendibleHash::<u64, u64>::new(capacity),
                |mut table| {
                    for key in 0..KEY_COUNT {
                        table.insert(key, key);
                    }
                    black_box(table.global_depth());
                },
                BatchSize::SmallInput,
            );
        });
    }

    let mut table = ExtendibleHash::<u64, u64>::new(16);
    for key in 0..KEY_COUNT {
        table.insert(key, key);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    group.throughput(Throughput::Elements(4_096));
    group.bench_function("find", |b| {
        b.iter(|| {
            for _ in 0..4_096 {
                let key = rng.gen_range(0..KEY_COUNT * 2);
                black_box(table.find(&key));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, micro_hash);
criterion_main!(benches);
