//! Lane runtime and dispatch fabric.
//!
//! # Overview
//!
//! Work is sharded across a fixed set of single-threaded lanes. Each lane
//! owns one user state object outright; a pure `hash(key) % lanes` routing
//! rule gives per-key serialization with no cross-lane locking, and each
//! lane's worker trades CPU for latency with a tiered idle backoff.
//!
//! ```text
//! caller ─► Dispatcher::submit_keyed(key, op, cont)
//!               │ route(key) = hash(key) % N
//!               ▼
//!           Lane[i] inbox (bounded MPMC ring) ─► worker i:
//!               thunk(&mut state_i); cont(result)   // on worker i
//! ```
//!
//! # Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`dispatcher`] | lane array, keyed routing, broadcast, coordinated stop |
//! | [`lane`] | worker thread, owned state, inbox pump, shutdown protocol |
//! | [`task`] | type-safe (op, continuation) binding into erased thunks |
//! | [`sleeper`] | tiered idle backoff (yield → 1 µs → 10 µs → 100 µs → 1 ms) |
//! | [`affinity`] | best-effort core pinning and topology queries |
//! | [`error`] | construction and submission error types |
//!
//! # Non-Negotiable Invariants
//!
//! - **No loss on success**: a submission that returned `Ok` executes
//!   exactly once against its lane's state before `stop()` completes.
//! - **Per-lane FIFO**: tasks landing on one lane run — and complete — in
//!   enqueue order, across all producers.
//! - **Exclusive state ownership**: lane state is touched only by its
//!   worker; the `Send` boundary is crossed once, at construction.
//! - **Affinity is advisory**: pinning failures degrade to warnings, never
//!   to incorrect behavior.

pub mod affinity;
pub mod dispatcher;
pub mod error;
pub mod lane;
pub mod sleeper;
pub mod task;

pub use affinity::{core_info, CoreInfo};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{BuildError, SubmitError};
pub use lane::Lane;
pub use sleeper::AdaptiveSleeper;
pub use task::Thunk;
