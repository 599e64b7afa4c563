//! # Scheduler Performance Benchmark
//!
//! HOUSE REQUIREMENTS:
//! - 10,000 live processes
//! - Tick cost linear in due processes
//! - Compaction cost linear in table size
//!
//! Run with: `cargo bench --package cadence_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use cadence_core::{from_fn, RunOptions, Scheduler, Segment, Selector, Step};

/// Live process count for the steady-state benchmarks.
const PROCESS_COUNT: usize = 10_000;

fn populated(count: usize, frames: u32) -> Scheduler {
    let mut scheduler = Scheduler::default();
    for i in 0..count {
        let mut left = frames;
        scheduler.run(
            from_fn(move |_| {
                if left == 0 {
                    return Ok(Step::Complete);
                }
                left -= 1;
                Ok(Step::NEXT_FRAME)
            }),
            RunOptions::new().tag(if i % 2 == 0 { "even" } else { "odd" }),
        );
    }
    scheduler
}

/// Benchmark: one tick over N processes that all step.
fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_all_due");

    for count in [1_000, PROCESS_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut scheduler = populated(count, u32::MAX);
            b.iter(|| black_box(scheduler.tick(Segment::Update, 0.016)));
        });
    }

    group.finish();
}

/// Benchmark: tick where most processes are still sleeping.
fn bench_tick_sleeping(c: &mut Criterion) {
    c.bench_function("tick_sleeping_10k", |b| {
        let mut scheduler = Scheduler::default();
        for _ in 0..PROCESS_COUNT {
            scheduler.run(from_fn(|cx| Ok(cx.wait_for_seconds(1.0e9))), RunOptions::new());
        }
        b.iter(|| black_box(scheduler.tick(Segment::Update, 0.016)));
    });
}

/// Benchmark: compaction of a half-dead table.
fn bench_compaction(c: &mut Criterion) {
    c.bench_function("compact_half_dead_10k", |b| {
        b.iter_batched(
            || {
                let mut scheduler = populated(PROCESS_COUNT, u32::MAX);
                scheduler.kill_group(Selector::Tag("odd"));
                scheduler
            },
            |mut scheduler| black_box(scheduler.compact()),
            BatchSize::LargeInput,
        );
    });
}

/// Benchmark: pause and resume a tag group.
fn bench_pause_resume(c: &mut Criterion) {
    c.bench_function("pause_resume_5k", |b| {
        let mut scheduler = populated(PROCESS_COUNT, u32::MAX);
        b.iter(|| {
            let paused = scheduler.pause(Selector::Tag("even"));
            let resumed = scheduler.resume(Selector::Tag("even"));
            scheduler.compact();
            black_box((paused, resumed))
        });
    });
}

criterion_group!(
    benches,
    bench_tick,
    bench_tick_sleeping,
    bench_compaction,
    bench_pause_resume,
);
criterion_main!(benches);
