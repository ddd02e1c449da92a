use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use freedv_relay::protocol::Point2D;
use freedv_relay::stats::{FilterParams, RollingBoundsBuffer, ScatterBuffer};

fn wave(i: usize) -> Point2D {
    Point2D::new(i as f64, (i as f64 * 0.37).sin() * 10.0)
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_append");
    for capacity in [60usize, 600, 6000] {
        group.bench_with_input(BenchmarkId::new("wave", capacity), &capacity, |b, &capacity| {
            let mut buffer = RollingBoundsBuffer::new(capacity);
            let mut i = 0usize;
            b.iter(|| {
                black_box(buffer.append(wave(i)));
                i += 1;
            });
        });

        // every eviction removes the current minimum
        group.bench_with_input(BenchmarkId::new("rising_min", capacity), &capacity, |b, &capacity| {
            let mut buffer = RollingBoundsBuffer::new(capacity);
            let mut i = 0usize;
            b.iter(|| {
                black_box(buffer.append(Point2D::new(i as f64, i as f64)));
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_scatter(c: &mut Criterion) {
    c.bench_function("scatter_push_batch", |b| {
        let mut buffer = ScatterBuffer::new(60, FilterParams::default());
        let batch: Vec<Point2D> = (0..15).map(wave).collect();
        b.iter(|| black_box(buffer.push_batch(batch.iter().copied())));
    });
}

criterion_group!(benches, bench_append, bench_scatter);
criterion_main!(benches);
