use criterion::{Criterion, criterion_group, criterion_main};
use microloop_scheduler::{FnTask, MicroClock, Scheduler, WaitSignal, WaitStrategy};
use std::hint::black_box;
use std::sync::Arc;

fn benchmark_wait_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_poll");

    for strategy in [
        WaitStrategy::Spin,
        WaitStrategy::Condvar,
        WaitStrategy::Channel,
    ] {
        let wait_group = strategy.build(Arc::new(MicroClock::new()));
        group.bench_function(format!("{strategy:?}_empty_poll"), |b| {
            b.iter(|| black_box(wait_group.wait_any(0)));
        });

        let wait_group = strategy.build(Arc::new(MicroClock::new()));
        group.bench_function(format!("{strategy:?}_restart_roundtrip"), |b| {
            b.iter(|| {
                wait_group.raise(WaitSignal::Restart);
                black_box(wait_group.wait_any(0))
            });
        });
    }

    group.finish();
}

fn benchmark_task_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_store");

    group.bench_function("add_cancel_cycle", |b| {
        let scheduler = Scheduler::new();
        b.iter(|| {
            let id = scheduler.add_task(FnTask::new(1_000_000, false, || Ok(true)));
            scheduler.cancel_task(black_box(id));
        });
    });

    group.bench_function("add_cancel_among_1000", |b| {
        let scheduler = Scheduler::new();
        for _ in 0..1_000 {
            scheduler.add_task(FnTask::new(1_000_000, false, || Ok(true)));
        }
        b.iter(|| {
            let id = scheduler.add_task(FnTask::new(500_000, false, || Ok(true)));
            scheduler.cancel_task(black_box(id));
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_wait_poll, benchmark_task_store);
criterion_main!(benches);
