// The benchmarks aim to only measure times of the operations in their names.
// That's why all use Bencher::iter_batched which enables non-benchmarked
// preparation before running the measured function.
// Put runs against a map filled to a random load, lookups hit both key
// tables, and erase empties a full map. The map sizes are chosen at random
// from constant ranges so that no single load factor dominates the results.

extern crate criterion;
extern crate dmap;
extern crate rand;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dmap::{DoubleKeyed, DoubleMap};
use rand::seq::SliceRandom;
use rand::Rng;

// ranges of slot counts for the benchmarks (MINs are inclusive, MAXes exclusive):
const CAPACITY_MIN: usize = 1000;
const CAPACITY_MAX: usize = 4000;

#[derive(Clone)]
struct Flow {
    internal: (u32, u16),
    external: (u32, u16),
    stats: [u64; 8],
}

impl DoubleKeyed for Flow {
    type Key1 = (u32, u16);
    type Key2 = (u32, u16);
    type Bare = [u64; 8];

    fn extract(self) -> ((u32, u16), (u32, u16), [u64; 8]) {
        (self.internal, self.external, self.stats)
    }

    fn pack(stats: [u64; 8], internal: (u32, u16), external: (u32, u16)) -> Self {
        Flow {
            internal,
            external,
            stats,
        }
    }
}

fn flows(count: usize) -> Vec<Flow> {
    let mut rng = rand::rng();
    let mut out: Vec<Flow> = (0..count)
        .map(|i| Flow {
            internal: (0x0a00_0000 | i as u32, rng.random()),
            external: (0xc0a8_0000, 1024 + i as u16),
            stats: [i as u64; 8],
        })
        .collect();
    out.shuffle(&mut rng);
    out
}

fn prepare_full() -> (DoubleMap<Flow>, Vec<Flow>) {
    let capacity = rand::rng().random_range(CAPACITY_MIN..CAPACITY_MAX);
    let mut map = DoubleMap::allocate(capacity).unwrap();
    let list = flows(capacity);
    for (i, f) in list.iter().enumerate() {
        map.put(f, i).unwrap();
    }
    (map, list)
}

pub fn put(c: &mut Criterion) {
    c.bench_function("put", |b| {
        b.iter_batched(
            || {
                let capacity = rand::rng().random_range(CAPACITY_MIN..CAPACITY_MAX);
                let map: DoubleMap<Flow> = DoubleMap::allocate(capacity).unwrap();
                (map, flows(capacity))
            },
            |(mut map, list)| {
                for (i, f) in list.iter().enumerate() {
                    let _ = map.put(f, i);
                }
                map
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn get_by_key1(c: &mut Criterion) {
    c.bench_function("get_by_key1", |b| {
        b.iter_batched(
            prepare_full,
            |(map, list)| {
                for f in list.iter() {
                    black_box(map.get_by_key1(&f.internal));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn get_by_key2(c: &mut Criterion) {
    c.bench_function("get_by_key2", |b| {
        b.iter_batched(
            prepare_full,
            |(map, list)| {
                for f in list.iter() {
                    black_box(map.get_by_key2(&f.external));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn get_value(c: &mut Criterion) {
    c.bench_function("get_value", |b| {
        b.iter_batched(
            prepare_full,
            |(map, list)| {
                for i in 0..list.len() {
                    let _ = black_box(map.get_value(i));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn erase(c: &mut Criterion) {
    c.bench_function("erase", |b| {
        b.iter_batched(
            prepare_full,
            |(mut map, list)| {
                for i in 0..list.len() {
                    let _ = map.erase(i);
                }
                map
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, put, get_by_key1, get_by_key2, get_value, erase);
criterion_main!(benches);
