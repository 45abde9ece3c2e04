use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam::queue::SegQueue;
use std::hint::black_box;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use unbounded_channel::{Backoff, UnboundedChannel};

const PAIRS_PER_THREAD: usize = 10_000;

// Every thread sends one value and immediately receives one, so no receive
// can wait forever. This mirrors running a channel under parallel load.
fn bench_send_recv_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("Channel send/recv pairs");
    group.sample_size(10);

    for &threads in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("UnboundedChannel (busy spin)", threads),
            &threads,
            |b, &threads| {
                let channel = Arc::new(UnboundedChannel::new());
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let channel = Arc::clone(&channel);
                            thread::spawn(move || {
                                for i in 0..PAIRS_PER_THREAD {
                                    channel.enqueue(black_box(i));
                                    black_box(channel.dequeue());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("UnboundedChannel (backoff)", threads),
            &threads,
            |b, &threads| {
                let channel = Arc::new(UnboundedChannel::with_wait_strategy(Backoff));
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let channel = Arc::clone(&channel);
                            thread::spawn(move || {
                                for i in 0..PAIRS_PER_THREAD {
                                    channel.enqueue(black_box(i));
                                    black_box(channel.dequeue());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        // std's receiver is single-consumer, so it is shared behind a mutex.
        group.bench_with_input(
            BenchmarkId::new("std sync_channel(100)", threads),
            &threads,
            |b, &threads| {
                let (tx, rx) = mpsc::sync_channel(100);
                let rx = Arc::new(Mutex::new(rx));
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let tx = tx.clone();
                            let rx = Arc::clone(&rx);
                            thread::spawn(move || {
                                for i in 0..PAIRS_PER_THREAD {
                                    tx.send(black_box(i)).unwrap();
                                    black_box(rx.lock().unwrap().recv().unwrap());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam bounded(100)", threads),
            &threads,
            |b, &threads| {
                let (tx, rx) = crossbeam::channel::bounded(100);
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let (tx, rx) = (tx.clone(), rx.clone());
                            thread::spawn(move || {
                                for i in 0..PAIRS_PER_THREAD {
                                    tx.send(black_box(i)).unwrap();
                                    black_box(rx.recv().unwrap());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam SegQueue", threads),
            &threads,
            |b, &threads| {
                let queue = Arc::new(SegQueue::new());
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            thread::spawn(move || {
                                for i in 0..PAIRS_PER_THREAD {
                                    queue.push(black_box(i));
                                    while queue.pop().map(black_box).is_none() {
                                        std::hint::spin_loop();
                                    }
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_send_recv_pairs);
criterion_main!(benches);
