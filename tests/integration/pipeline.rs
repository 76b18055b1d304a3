//! Three dispatchers chained through continuations, plus a multi-producer
//! hammer. Both double as no-loss regression guards: every accepted
//! submission must be visible in the final per-lane sums.

use laneq::{Dispatcher, DispatcherConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::StrideHash;

struct MathOperator {
    value: i64,
}

impl MathOperator {
    fn add(&mut self, amount: i64) -> i64 {
        self.value += amount;
        amount
    }

    fn get(&self) -> i64 {
        self.value
    }
}

type Layer = Arc<Dispatcher<MathOperator, StrideHash>>;

fn layer(lanes: usize) -> Layer {
    Arc::new(
        Dispatcher::with_hasher(
            DispatcherConfig {
                lanes,
                capacity: 128 * 1024,
                pin_workers: false,
            },
            StrideHash,
            |_| MathOperator { value: 0 },
        )
        .expect("dispatcher build"),
    )
}

/// Broadcast a read through the layer and wait for every lane to answer:
/// after this returns, all previously enqueued work on the layer is done and
/// every downstream submission its continuations make has been enqueued.
fn flush(layer: &Layer) {
    let (tx, rx) = mpsc::channel();
    layer
        .submit_broadcast(|op| op.get(), move |_| tx.send(()).unwrap())
        .unwrap();
    for _ in 0..layer.lane_count() {
        rx.recv_timeout(Duration::from_secs(60)).unwrap();
    }
}

fn total(layer: &Layer) -> i64 {
    let (tx, rx) = mpsc::channel();
    layer
        .submit_broadcast(|op| op.get(), move |v| tx.send(v).unwrap())
        .unwrap();
    (0..layer.lane_count())
        .map(|_| rx.recv_timeout(Duration::from_secs(60)).unwrap())
        .sum()
}

/// Pushes one unit through start → mid → end, keeping the key across layers.
/// Each continuation runs on the upstream lane's worker and blocking-submits
/// into the next layer.
fn add_value(start: &Layer, mid: &Layer, end: &Layer, key: u64, amount: i64) {
    let mid = Arc::clone(mid);
    let end = Arc::clone(end);
    start
        .submit_keyed(&key, move |op| op.add(amount), move |forwarded| {
            let end = Arc::clone(&end);
            mid.submit_keyed(&key, move |op| op.add(forwarded), move |forwarded| {
                end.submit_keyed(&key, move |op| op.add(forwarded), |_| ())
                    .unwrap();
            })
            .unwrap();
        })
        .unwrap();
}

fn run_pipeline(messages: u64) {
    let end = layer(1);
    let mid = layer(10);
    let start = layer(10);

    for i in 0..messages {
        add_value(&start, &mid, &end, i % 10, 1);
    }

    // Drain layer by layer so every in-flight continuation lands before the
    // next flush.
    flush(&start);
    flush(&mid);
    flush(&end);

    assert_eq!(total(&end), messages as i64);
}

#[test]
fn pipeline_delivers_every_message() {
    run_pipeline(200_000);
}

/// The original sizing: ten million messages through three layers. Slow;
/// run explicitly with `cargo test --test integration -- --ignored`.
#[test]
#[ignore]
fn pipeline_delivers_ten_million_messages() {
    run_pipeline(10_000_000);
}

/// Many producer threads hammering a small-capacity dispatcher with blocking
/// submissions. Backpressure stalls producers but never drops: the final sum
/// across lanes equals exactly the number of accepted submissions.
#[test]
fn no_loss_under_contention() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 50_000;

    let d = Arc::new(
        Dispatcher::with_hasher(
            DispatcherConfig {
                lanes: 4,
                capacity: 64,
                pin_workers: false,
            },
            StrideHash,
            |_| MathOperator { value: 0 },
        )
        .expect("dispatcher build"),
    );

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let d = Arc::clone(&d);
            std::thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let key = (p * PER_PRODUCER + i) % 13;
                    d.submit_keyed(&key, |op| op.add(1), |_| ()).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(total(&d), (PRODUCERS * PER_PRODUCER) as i64);
}
