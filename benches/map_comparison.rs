use std::hint::black_box;

use criterion::BatchSize;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rank_map::WatchMap;

const SIZES: [usize; 2] = [512, 4096];

fn pairs(count: usize) -> Vec<(String, u64)> {
    (0..count as u64)
        .map(|n| (format!("key[{n:016X}]"), n))
        .collect()
}

fn bench_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("populate");

    for size in SIZES {
        let pairs = pairs(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("watch_map/{size}"), |b| {
            b.iter_batched(
                || pairs.clone(),
                |pairs| {
                    let map: WatchMap<String, u64> = WatchMap::new();
                    for (key, value) in pairs {
                        map.insert(key, value);
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || pairs.clone(),
                |pairs| {
                    let mut map = hashbrown::HashMap::new();
                    for (key, value) in pairs {
                        map.insert(key, value);
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("std/{size}"), |b| {
            b.iter_batched(
                || pairs.clone(),
                |pairs| {
                    let mut map = std::collections::HashMap::new();
                    for (key, value) in pairs {
                        map.insert(key, value);
                    }
                    black_box(map)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let mut rng = SmallRng::seed_from_u64(0x524B4D50);

    for size in SIZES {
        let mut keys: Vec<String> = pairs(size).into_iter().map(|(key, _)| key).collect();
        keys.shuffle(&mut rng);
        group.throughput(Throughput::Elements(size as u64));

        let watch: WatchMap<String, u64> = pairs(size).into_iter().collect();
        group.bench_function(format!("watch_map/{size}"), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(watch.get(key));
                }
            })
        });

        let brown: hashbrown::HashMap<String, u64> = pairs(size).into_iter().collect();
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(brown.get(key));
                }
            })
        });

        let std_map: std::collections::HashMap<String, u64> = pairs(size).into_iter().collect();
        group.bench_function(format!("std/{size}"), |b| {
            b.iter(|| {
                for key in &keys {
                    black_box(std_map.get(key));
                }
            })
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for size in SIZES {
        group.throughput(Throughput::Elements(size as u64));

        let watch: WatchMap<String, u64> = pairs(size).into_iter().collect();
        group.bench_function(format!("watch_map/{size}"), |b| {
            b.iter(|| {
                let mut total = 0u64;
                for entry in watch.iter() {
                    if let Some(value) = entry.value() {
                        total = total.wrapping_add(*value);
                    }
                }
                black_box(total)
            })
        });

        let std_map: std::collections::HashMap<String, u64> = pairs(size).into_iter().collect();
        group.bench_function(format!("std/{size}"), |b| {
            b.iter(|| {
                let mut total = 0u64;
                for value in std_map.values() {
                    total = total.wrapping_add(*value);
                }
                black_box(total)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_populate, bench_get, bench_iterate);
criterion_main!(benches);
