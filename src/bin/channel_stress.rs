use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Context, Result};
use argh::FromArgs;
use unbounded_channel::{Backoff, BusySpin, SpinThenPark, UnboundedChannel, WaitStrategy};

#[derive(Debug, FromArgs)]
/// Hammer an unbounded channel with tagged values and verify delivery
struct Args {
    /// number of producer threads
    #[argh(option, default = "4")]
    producers: usize,
    /// number of consumer threads
    #[argh(option, default = "4")]
    consumers: usize,
    /// values enqueued by each producer
    #[argh(option, default = "250_000")]
    per_producer: usize,
    /// what consumers do on an empty queue: "spin", "backoff" or "park"
    #[argh(option, default = "Strategy::Spin")]
    strategy: Strategy,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Spin,
    Backoff,
    Park,
}

impl FromStr for Strategy {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spin" => Ok(Strategy::Spin),
            "backoff" => Ok(Strategy::Backoff),
            "park" => Ok(Strategy::Park),
            _ => Err("invalid strategy"),
        }
    }
}

type Tag = (usize, usize);

pub fn main() -> Result<()> {
    let args = argh::from_env::<Args>();
    unbounded_channel::trace::init_tracing();

    ensure!(args.producers > 0, "producers must not be zero");
    ensure!(args.consumers > 0, "consumers must not be zero");
    ensure!(args.per_producer > 0, "per-producer must not be zero");
    let total = args
        .producers
        .checked_mul(args.per_producer)
        .ok_or_else(|| anyhow!("producers * per-producer overflows"))?;
    ensure!(
        total % args.consumers == 0,
        "consumers ({}) must divide the total value count ({total})",
        args.consumers
    );

    tracing::info!(
        producers = args.producers,
        consumers = args.consumers,
        per_producer = args.per_producer,
        strategy = ?args.strategy,
        "starting stress run"
    );

    let (elapsed, batches) = match args.strategy {
        Strategy::Spin => run(&args, BusySpin)?,
        Strategy::Backoff => run(&args, Backoff)?,
        Strategy::Park => run(&args, SpinThenPark::default())?,
    };

    verify(&args, &batches)?;

    let secs = elapsed.as_secs_f64();
    tracing::info!(
        values = total,
        elapsed = ?elapsed,
        ops_per_sec = (2 * total) as f64 / secs.max(f64::EPSILON),
        "verified: every value delivered exactly once, per-producer order kept"
    );
    Ok(())
}

fn run<W>(args: &Args, strategy: W) -> Result<(Duration, Vec<Vec<Tag>>)>
where
    W: WaitStrategy + 'static,
{
    let channel = Arc::new(UnboundedChannel::with_wait_strategy(strategy));
    let per_consumer = args.producers * args.per_producer / args.consumers;
    let start = Instant::now();

    let consumers = (0..args.consumers)
        .map(|c| {
            let channel = Arc::clone(&channel);
            thread::Builder::new()
                .name(format!("consumer-{c}"))
                .spawn(move || {
                    let batch: Vec<Tag> = (0..per_consumer).map(|_| channel.dequeue()).collect();
                    tracing::debug!(received = batch.len(), "consumer done");
                    batch
                })
                .with_context(|| format!("failed to spawn consumer {c}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let producers = (0..args.producers)
        .map(|p| {
            let channel = Arc::clone(&channel);
            let per_producer = args.per_producer;
            thread::Builder::new()
                .name(format!("producer-{p}"))
                .spawn(move || {
                    for seq in 0..per_producer {
                        channel.enqueue((p, seq));
                    }
                    tracing::debug!(sent = per_producer, "producer done");
                })
                .with_context(|| format!("failed to spawn producer {p}"))
        })
        .collect::<Result<Vec<_>>>()?;

    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))?;
    }
    let batches = consumers
        .into_iter()
        .map(|c| c.join().map_err(|_| anyhow!("consumer thread panicked")))
        .collect::<Result<Vec<_>>>()?;
    let elapsed = start.elapsed();

    ensure!(channel.is_empty(), "channel not empty after the run");
    Ok((elapsed, batches))
}

fn verify(args: &Args, batches: &[Vec<Tag>]) -> Result<()> {
    let mut seen = vec![vec![false; args.per_producer]; args.producers];
    for (consumer, batch) in batches.iter().enumerate() {
        let mut last: Vec<Option<usize>> = vec![None; args.producers];
        for &(p, seq) in batch {
            ensure!(
                p < args.producers && seq < args.per_producer,
                "consumer {consumer} received unknown value ({p}, {seq})"
            );
            ensure!(!seen[p][seq], "value ({p}, {seq}) delivered twice");
            seen[p][seq] = true;
            if let Some(prev) = last[p] {
                ensure!(
                    prev < seq,
                    "consumer {consumer} saw producer {p} out of order: {prev} then {seq}"
                );
            }
            last[p] = Some(seq);
        }
    }
    let missing = seen.iter().flatten().filter(|&&s| !s).count();
    ensure!(missing == 0, "{missing} values were never delivered");
    Ok(())
}
