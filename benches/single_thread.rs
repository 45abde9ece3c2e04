use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;
use unbounded_channel::UnboundedChannel;

fn benchmark_unbounded_channel_single_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("UnboundedChannel Single-threaded");

    for &size in &[100, 200, 400, 600, 800, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("Enqueue Single-threaded", size),
            &size,
            |b, &size| {
                // A fresh queue per batch keeps the footprint flat; the filled
                // queue is returned so its drop is not timed.
                b.iter_batched(
                    UnboundedChannel::<usize>::new,
                    |channel| {
                        for i in 0..size {
                            channel.enqueue(black_box(i));
                        }
                        channel
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    for &size in &[100, 200, 400, 600, 800, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("Enqueue then Dequeue Single-threaded", size),
            &size,
            |b, &size| {
                let channel = UnboundedChannel::new();
                b.iter(|| {
                    for i in 0..size {
                        channel.enqueue(black_box(i));
                    }
                    for _ in 0..size {
                        black_box(channel.dequeue());
                    }
                });
            },
        );
    }

    for &size in &[100, 200, 400, 600, 800, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("Try-dequeue on empty Single-threaded", size),
            &size,
            |b, &size| {
                let channel: UnboundedChannel<usize> = UnboundedChannel::new();
                b.iter(|| {
                    for _ in 0..size {
                        black_box(channel.try_dequeue());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_unbounded_channel_single_threaded);
criterion_main!(benches);
