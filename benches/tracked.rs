//! Benchmarks for spark-tracked
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_tracked::{
    effect, flush_sync, root, Derived, ReactiveDate, ReactiveMap, ReactiveSet, ReactiveUrl, ReactiveVec,
    Tracked,
};

// =============================================================================
// TRACKED BENCHMARKS
// =============================================================================

fn bench_tracked_create(c: &mut Criterion) {
    c.bench_function("tracked_create", |b| b.iter(|| black_box(Tracked::new(0i32))));
}

fn bench_tracked_get(c: &mut Criterion) {
    let t = Tracked::new(42i32);
    c.bench_function("tracked_get", |b| b.iter(|| black_box(t.get())));
}

fn bench_tracked_set(c: &mut Criterion) {
    let t = Tracked::new(0i32);
    let mut i = 0i32;
    c.bench_function("tracked_set", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            t.set(black_box(i))
        })
    });
}

fn bench_tracked_set_same_value(c: &mut Criterion) {
    let t = Tracked::new(42i32);
    c.bench_function("tracked_set_same_value", |b| b.iter(|| t.set(black_box(42))));
}

// =============================================================================
// DERIVED BENCHMARKS
// =============================================================================

fn bench_derived_get_cached(c: &mut Criterion) {
    let t = Tracked::new(42i32);
    let t2 = t.clone();
    let d = Derived::new(move || t2.get() * 2);
    let _ = d.get();

    c.bench_function("derived_get_cached", |b| b.iter(|| black_box(d.get())));
}

fn bench_derived_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived_chain");

    for depth in [1, 5, 10, 20] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let t = Tracked::new(1i32);

            let mut current = {
                let t = t.clone();
                Derived::new(move || t.get() + 1)
            };
            for _ in 1..depth {
                let prev = current.clone();
                current = Derived::new(move || prev.get() + 1);
            }

            let mut i = 0i32;
            b.iter(|| {
                i = i.wrapping_add(1);
                t.set(black_box(i));
                black_box(current.get())
            })
        });
    }

    group.finish();
}

// =============================================================================
// EFFECT BENCHMARKS
// =============================================================================

fn bench_effect_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_flush");

    for count in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::new("effects", count), &count, |b, &count| {
            let t = Tracked::new(0i32);
            let reader = t.clone();
            let tree = root(move || {
                for _ in 0..count {
                    let t = reader.clone();
                    effect(move || {
                        black_box(t.get());
                    });
                }
            });
            flush_sync();

            let mut i = 0i32;
            b.iter(|| {
                i = i.wrapping_add(1);
                t.set(i);
                flush_sync();
            });

            tree.dispose();
        });
    }

    group.finish();
}

// =============================================================================
// WRAPPER BENCHMARKS
// =============================================================================

fn bench_map_insert_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive_map");

    for size in [10u32, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("insert_get", size), &size, |b, &size| {
            b.iter(|| {
                let m: ReactiveMap<u32, u32> = ReactiveMap::new();
                for k in 0..size {
                    m.insert(k, k);
                }
                for k in 0..size {
                    black_box(m.get(&k));
                }
            })
        });
    }

    group.finish();
}

fn bench_map_equal_write(c: &mut Criterion) {
    let m: ReactiveMap<u32, u32> = (0..100).map(|k| (k, k)).collect();
    c.bench_function("reactive_map_equal_write", |b| b.iter(|| m.insert(black_box(50), 50)));
}

fn bench_set_union(c: &mut Criterion) {
    let a: ReactiveSet<u32> = (0..500).collect();
    let other: ReactiveSet<u32> = (250..750).collect();
    c.bench_function("reactive_set_union", |b| b.iter(|| black_box(a.union(&other).len())));
}

fn bench_vec_push_index(c: &mut Criterion) {
    c.bench_function("reactive_vec_push_index", |b| {
        b.iter(|| {
            let v: ReactiveVec<u32> = ReactiveVec::new();
            for i in 0..100 {
                v.push(i);
            }
            black_box(v.get(50))
        })
    });
}

fn bench_date_memo(c: &mut Criterion) {
    let date = ReactiveDate::from_timestamp_millis(1_709_634_030_456).unwrap_or_else(|_| ReactiveDate::now());
    c.bench_function("reactive_date_memo_hit", |b| b.iter(|| black_box(date.get_utc_full_year())));
}

fn bench_url_params_write(c: &mut Criterion) {
    let url = match ReactiveUrl::parse("https://example.com/search?q=rust") {
        Ok(url) => url,
        Err(e) => panic!("bench url: {e}"),
    };
    let params = url.search_params();
    let mut page = 0u32;
    c.bench_function("reactive_url_params_write", |b| {
        b.iter(|| {
            page = page.wrapping_add(1);
            params.set("page", &page.to_string());
            black_box(url.search())
        })
    });
}

criterion_group!(
    tracked_benches,
    bench_tracked_create,
    bench_tracked_get,
    bench_tracked_set,
    bench_tracked_set_same_value,
);

criterion_group!(derived_benches, bench_derived_get_cached, bench_derived_chain);

criterion_group!(effect_benches, bench_effect_flush);

criterion_group!(
    wrapper_benches,
    bench_map_insert_get,
    bench_map_equal_write,
    bench_set_union,
    bench_vec_push_index,
    bench_date_memo,
    bench_url_params_write,
);

criterion_main!(tracked_benches, derived_benches, effect_benches, wrapper_benches);
