//! Benchmark for AtomicList churn at the front of the list.
//!
//! Run with: cargo bench --package atomic-data-core --bench atomic_list_benchmark

use std::sync::Arc;
use std::thread;

use atomic_data_core::data_structures::AtomicList;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 2_000;

type List = AtomicList<u64>;

/// Every thread pushes and pops in turn
fn bench_push_pop(list: Arc<List>, thread_count: usize, ops_per_thread: usize) {
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    list.push_front((t * ops_per_thread + i) as u64);
                    black_box(list.pop_front());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Walks a prefilled list while other threads insert behind the head
fn bench_iterate_while_inserting(list: Arc<List>, thread_count: usize, ops_per_thread: usize) {
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    if t % 2 == 0 {
                        let head = list.begin();
                        black_box(list.insert_after_weak(&head, i as u64));
                    } else {
                        black_box(list.iter().take(64).count());
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

fn push_pop_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_atomic_list");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("push_pop_atomic_list", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let list = Arc::new(List::new());
                    bench_push_pop(list, black_box(threads), black_box(OPS_PER_THREAD))
                })
            },
        );
    }

    group.finish();
}

fn iterate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate_atomic_list");

    for threads in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("iterate_while_inserting", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let list = Arc::new(List::new());
                    for value in 0..128 {
                        list.push_front(value);
                    }
                    bench_iterate_while_inserting(list, black_box(threads), black_box(OPS_PER_THREAD))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, push_pop_benchmark, iterate_benchmark);
criterion_main!(benches);
