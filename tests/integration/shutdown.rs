//! Backpressure and shutdown behavior observed through the public API.

use laneq::{Dispatcher, DispatcherConfig, SubmitError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::StrideHash;

fn counter_dispatcher(lanes: usize, capacity: usize) -> Dispatcher<u64, StrideHash> {
    Dispatcher::with_hasher(
        DispatcherConfig {
            lanes,
            capacity,
            pin_workers: false,
        },
        StrideHash,
        |_| 0u64,
    )
    .expect("dispatcher build")
}

/// Single lane, capacity four, worker wedged inside a slow op: four
/// non-blocking submissions are accepted, the fifth bounces with no
/// observable effect, and a sixth succeeds once the slow op completes.
#[test]
fn backpressure_bounces_fifth_submission() {
    let d = counter_dispatcher(1, 4);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    d.submit_keyed(
        &0u64,
        move |_count| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        },
        |()| {},
    )
    .unwrap();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    for _ in 0..4 {
        d.try_submit_keyed(&0u64, |count| *count += 1, |()| {})
            .unwrap();
    }
    assert_eq!(
        d.try_submit_keyed(&0u64, |count| *count += 1, |()| {}),
        Err(SubmitError::Full)
    );

    release_tx.send(()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match d.try_submit_keyed(&0u64, |count| *count += 1, |()| {}) {
            Ok(()) => break,
            Err(SubmitError::Full) if Instant::now() < deadline => std::thread::yield_now(),
            other => panic!("unexpected submit outcome: {other:?}"),
        }
    }

    // The bounced submission left no trace: 4 accepted fills + 1 late one.
    let (tx, rx) = mpsc::channel();
    d.submit_keyed(&0u64, |count| *count, move |v| tx.send(v).unwrap())
        .unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 5);
}

/// Stop drains: every continuation for an accepted submission fires before
/// `stop()` returns, and submissions after `stop()` get the typed rejection.
#[test]
fn stop_drains_then_rejects() {
    let mut d = counter_dispatcher(4, 256);
    let fired = Arc::new(AtomicUsize::new(0));

    for key in 0u64..100 {
        let fired = Arc::clone(&fired);
        d.submit_keyed(&key, |count| *count += 1, move |()| {
            fired.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    d.stop();
    assert_eq!(fired.load(Ordering::SeqCst), 100);

    assert_eq!(
        d.submit_keyed(&0u64, |count| *count += 1, |()| {}),
        Err(SubmitError::Stopped)
    );
    assert_eq!(
        d.try_submit_keyed(&0u64, |count| *count += 1, |()| {}),
        Err(SubmitError::Stopped)
    );
    assert_eq!(
        d.submit_broadcast(|_| (), |()| {}),
        Err(SubmitError::Stopped)
    );
}

#[test]
fn double_stop_is_a_no_op() {
    let mut d = counter_dispatcher(3, 64);
    let fired = Arc::new(AtomicUsize::new(0));
    for key in 0u64..30 {
        let fired = Arc::clone(&fired);
        d.submit_keyed(&key, |count| *count += 1, move |()| {
            fired.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    d.stop();
    let after_first = fired.load(Ordering::SeqCst);
    d.stop();

    assert_eq!(after_first, 30);
    assert_eq!(fired.load(Ordering::SeqCst), 30);
}

/// Routing stays put across the dispatcher's entire lifetime, including
/// after a stop.
#[test]
fn routing_survives_stop() {
    let mut d = counter_dispatcher(8, 64);
    let before: Vec<usize> = (0u64..64).map(|k| d.lane_for(&k)).collect();
    d.stop();
    let after: Vec<usize> = (0u64..64).map(|k| d.lane_for(&k)).collect();
    assert_eq!(before, after);
}

/// Dropping a dispatcher with queued work behaves like `stop()`: accepted
/// work drains before the workers exit.
#[test]
fn drop_drains_accepted_work() {
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let d = counter_dispatcher(2, 128);
        for key in 0u64..50 {
            let fired = Arc::clone(&fired);
            d.submit_keyed(&key, |count| *count += 1, move |()| {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    }
    assert_eq!(fired.load(Ordering::SeqCst), 50);
}
