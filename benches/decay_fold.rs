//! Benchmarks for the decay fold over one window buffer

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use decay_window::aggregate::{DecayAggregator, FoldOrder};
use decay_window::feed::Tick;

/// Ticks 7ms apart with a few swapped neighbours
fn window_buffer(len: usize) -> Vec<Tick> {
    (0..len)
        .map(|i| {
            let t = if i % 10 == 9 { i - 1 } else { i };
            let bid = 100_000.0 + (i % 17) as f64;
            Tick::new("BTCUSDT", t as i64 * 7, bid, bid + 0.5)
        })
        .collect()
}

fn benchmark_decay_fold(c: &mut Criterion) {
    let mut group = c.benchmark_group("decay_fold");

    for len in [100usize, 1_000, 10_000] {
        let ticks = window_buffer(len);

        let arrival = DecayAggregator::new(1_000, FoldOrder::Arrival).unwrap();
        group.bench_with_input(BenchmarkId::new("arrival", len), &ticks, |b, ticks| {
            b.iter(|| arrival.aggregate(black_box(ticks)))
        });

        let sorted = DecayAggregator::new(1_000, FoldOrder::EventTime).unwrap();
        group.bench_with_input(BenchmarkId::new("event_time", len), &ticks, |b, ticks| {
            b.iter(|| sorted.aggregate(black_box(ticks)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decay_fold);
criterion_main!(benches);
