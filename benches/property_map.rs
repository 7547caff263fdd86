//! Property map benchmarks
//!
//! Compares key sets built to collide under a classic `h = 31 * h + c` string hash
//! with ordinary keys. The map seeds its hasher per instance, so both sets should
//! scale the same way.
//!
//! Run with: cargo bench --bench property_map

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use jsrun::JsValue;
use jsrun::object::PropertyMap;
use jsrun::value::{Property, PropertyKey};

/// `count` distinct keys that all share one polynomial string hash
///
/// "Aa" and "BB" hash alike, so every string built from those two blocks collides.
fn colliding_keys(count: usize) -> Vec<PropertyKey> {
    let width = usize::BITS - count.max(2).leading_zeros();
    (0..count)
        .map(|n| {
            let key: String = (0..width)
                .map(|bit| if (n >> bit) & 1 == 1 { "BB" } else { "Aa" })
                .collect();
            PropertyKey::from(key.as_str())
        })
        .collect()
}

fn ordinary_keys(count: usize) -> Vec<PropertyKey> {
    (0..count)
        .map(|n| PropertyKey::from(format!("key_{:x}", n.wrapping_mul(0x9e37_79b9)).as_str()))
        .collect()
}

fn fill(keys: &[PropertyKey]) -> PropertyMap {
    let mut map = PropertyMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        map.insert(key.clone(), Property::data(JsValue::Number(i as f64)));
    }
    map
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_map/insert");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        let colliding = colliding_keys(count);
        group.bench_with_input(BenchmarkId::new("colliding", count), &colliding, |b, keys| {
            b.iter(|| black_box(fill(black_box(keys)).len()));
        });
        let ordinary = ordinary_keys(count);
        group.bench_with_input(BenchmarkId::new("ordinary", count), &ordinary, |b, keys| {
            b.iter(|| black_box(fill(black_box(keys)).len()));
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_map/lookup");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        for (name, keys) in [("colliding", colliding_keys(count)), ("ordinary", ordinary_keys(count))] {
            let map = fill(&keys);
            group.bench_with_input(BenchmarkId::new(name, count), &keys, |b, keys| {
                b.iter(|| keys.iter().filter(|k| map.get(k).is_some()).count());
            });
        }
    }

    group.finish();
}

/// Delete half the keys then re-insert them, exercising tombstone compaction
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("property_map/churn");
    let keys = ordinary_keys(1_000);

    group.bench_function("remove_reinsert", |b| {
        b.iter(|| {
            let mut map = fill(&keys);
            for key in keys.iter().step_by(2) {
                map.remove(key);
            }
            for key in keys.iter().step_by(2) {
                map.insert(key.clone(), Property::data(JsValue::Undefined));
            }
            black_box(map.ordered_keys().len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_churn);
criterion_main!(benches);
