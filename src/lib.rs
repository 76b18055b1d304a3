//! Partitioned task dispatcher: keyed routing onto pinned single-threaded
//! lanes.
//!
//! laneq shards work across a fixed set of execution lanes. Each lane is one
//! worker thread with exclusive ownership of a user state object and a
//! bounded inbox; submissions carry an operation plus a completion
//! continuation, and a pure `hash(key) % lanes` rule routes every key to the
//! same lane for the dispatcher's lifetime. The result: all operations for a
//! key are serialized with no locking around the state, continuations fire
//! in submission order, and independent keys run in parallel on separate
//! cores.
//!
//! ```no_run
//! use laneq::{Dispatcher, DispatcherConfig};
//! use std::sync::mpsc;
//!
//! let config = DispatcherConfig { lanes: 4, capacity: 1024, pin_workers: true };
//! let dispatcher = Dispatcher::new(config, |_lane| 0u64)?;
//!
//! // All operations for key 7 hit the same lane-local counter, in order.
//! dispatcher.submit_keyed(&7u64, |count| *count += 1, |()| {})?;
//!
//! let (tx, rx) = mpsc::channel();
//! dispatcher.submit_keyed(&7u64, |count| *count, move |v| tx.send(v).unwrap())?;
//! assert_eq!(rx.recv().unwrap(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # What lives where
//!
//! - [`dispatch`] — the runtime: [`Dispatcher`], [`Lane`], the adaptive idle
//!   backoff, and the best-effort core pinning.
//! - [`stdx`] — the lock-free bounded MPMC ring the lane inboxes are built
//!   on.
//!
//! # Scope
//!
//! In-process, fixed topology, best-effort latency. No durability, no
//! cross-process messaging, no lane resizing, no work stealing, no priority
//! classes, no cancellation: once accepted, a task runs, and a slow task
//! delays everything behind it on its lane. User code is assumed
//! cooperative — no long blocking calls inside operations or continuations.

pub mod dispatch;
pub mod stdx;

pub use dispatch::{
    core_info, AdaptiveSleeper, BuildError, CoreInfo, Dispatcher, DispatcherConfig, Lane,
    SubmitError, Thunk,
};
pub use stdx::MpmcRing;
