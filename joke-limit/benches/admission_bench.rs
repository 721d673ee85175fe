use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;

use governor::Quota;
use governor::RateLimiter;
use governor::clock::Clock;
use governor::clock::QuantaClock;
use governor::middleware::StateInformationMiddleware;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;

use joke_limit::FixedWindow;
use joke_limit::Reason;
use joke_limit::Reservoir;
use joke_limit::Strategy;

// Large enough that no benchmark run ever exhausts a window
const BUDGET: usize = 1_000_000;
const WINDOW: Duration = Duration::from_secs(60);

type GovernorLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock, StateInformationMiddleware>;

/// Governor as a baseline. It has no read-only capacity query, so
/// `remaining` reports the burst capacity seen at the last admission.
#[derive(Debug)]
struct GovernorStrategy {
    limiter: GovernorLimiter,
    clock: QuantaClock,
    last_remaining: AtomicUsize,
}

impl GovernorStrategy {
    fn new(budget: usize) -> Self {
        let burst = NonZeroU32::new(u32::try_from(budget).unwrap_or(u32::MAX)).unwrap();
        let clock = QuantaClock::default();
        let limiter = RateLimiter::direct_with_clock(Quota::per_minute(burst), clock.clone())
            .with_middleware::<StateInformationMiddleware>();

        Self {
            limiter,
            clock,
            last_remaining: AtomicUsize::new(budget),
        }
    }
}

impl Strategy for GovernorStrategy {
    fn process(&self) -> ControlFlow<Reason> {
        match self.limiter.check() {
            Ok(snapshot) => {
                self.last_remaining.store(
                    snapshot.remaining_burst_capacity() as usize,
                    Ordering::Relaxed,
                );
                ControlFlow::Continue(())
            }
            Err(not_until) => ControlFlow::Break(Reason::Exhausted {
                retry_after: not_until.wait_time_from(self.clock.now()),
            }),
        }
    }

    fn remaining(&self) -> usize {
        self.last_remaining.load(Ordering::Relaxed)
    }
}

/// The hot path of a fail-fast client: one admission per request.
fn bench_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit");

    let window = FixedWindow::new(BUDGET, WINDOW);
    group.bench_function("fixed_window", |b| b.iter(|| black_box(window.try_admit())));

    let reservoir = Reservoir::new(BUDGET, WINDOW, Duration::ZERO);
    group.bench_function("reservoir", |b| b.iter(|| black_box(reservoir.process())));

    let governor = GovernorStrategy::new(BUDGET);
    group.bench_function("governor", |b| b.iter(|| black_box(governor.process())));

    group.finish();
}

/// Refusals are what a client sees once its budget is spent.
fn bench_deny(c: &mut Criterion) {
    let mut group = c.benchmark_group("deny");

    let window = FixedWindow::new(0, WINDOW);
    group.bench_function("fixed_window", |b| b.iter(|| black_box(window.process())));

    let reservoir = Reservoir::new(0, WINDOW, Duration::ZERO);
    group.bench_function("reservoir", |b| b.iter(|| black_box(reservoir.process())));

    group.finish();
}

/// Read-only queries used for reporting.
fn bench_inspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect");

    let window = FixedWindow::new(BUDGET, WINDOW);
    group.bench_function("peek_available", |b| {
        b.iter(|| black_box(window.peek_available()))
    });
    group.bench_function("time_until_refill", |b| {
        b.iter(|| black_box(window.time_until_refill()))
    });

    group.finish();
}

/// Clones of one client admitting from several threads at once.
fn bench_shared(c: &mut Criterion) {
    let strategies: Vec<(&str, Arc<dyn Strategy>)> = vec![
        ("fixed_window", Arc::new(FixedWindow::new(BUDGET, WINDOW))),
        (
            "reservoir",
            Arc::new(Reservoir::new(BUDGET, WINDOW, Duration::ZERO)),
        ),
        ("governor", Arc::new(GovernorStrategy::new(BUDGET))),
    ];

    let mut group = c.benchmark_group("shared");
    for (name, strategy) in strategies {
        for clients in [2_u64, 4, 8] {
            group.bench_with_input(
                BenchmarkId::new(name, clients),
                &clients,
                |b, &clients| {
                    b.iter_custom(|iters| {
                        let per_client = iters / clients;
                        let start = Instant::now();
                        thread::scope(|scope| {
                            for _ in 0..clients {
                                scope.spawn(|| {
                                    for _ in 0..per_client {
                                        black_box(strategy.process());
                                    }
                                });
                            }
                        });
                        start.elapsed()
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_admit, bench_deny, bench_inspect, bench_shared);
criterion_main!(benches);
