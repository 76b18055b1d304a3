//! The dispatcher: a fixed array of lanes behind a keyed routing policy.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 Dispatcher                   │
//!   submit_keyed(k, ..) ──┼─► lane = hash(k) % N ──► Lane[lane].submit   │
//!                         │                                              │
//!   submit_broadcast(..) ─┼─► every lane, shared op + continuation       │
//!                         │                                              │
//!   stop() ───────────────┼─► Lane[0].stop(), Lane[1].stop(), …          │
//!                         └──────────────────────────────────────────────┘
//! ```
//!
//! # Routing contract
//!
//! `lane = hasher.hash_one(key) % N` is the only routing rule. The hasher is
//! fixed at construction, so the same key maps to the same lane for the
//! dispatcher's lifetime — which is what gives per-key serialization without
//! any cross-lane locking. Correctness does not depend on hash quality, only
//! on purity; load balance does. Keys that happen to collide onto one lane
//! are totally ordered too, but callers must not rely on that.
//!
//! # Broadcast contract
//!
//! A broadcast enqueues the same logical task on every lane exactly once.
//! The operation and the continuation are *shared* across lanes (one value,
//! `Arc`-wrapped, not cloned per lane), so a broadcast continuation runs
//! concurrently on several workers. The `Fn + Sync` bounds make that safe by
//! construction — a continuation needing mutation must bring its own
//! synchronization (an atomic accumulator, a channel sender, …).
//!
//! # Lifecycle
//!
//! Lanes are started eagerly at construction; if lane `i` fails to start,
//! lanes `0..i` are stopped and the error is returned — a partially
//! initialized dispatcher is never observable. `stop()` stops lanes in index
//! order and is idempotent; `Drop` stops.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crate::dispatch::error::{BuildError, SubmitError};
use crate::dispatch::lane::Lane;
use crate::dispatch::task::bind;

/// Dispatcher construction parameters.
///
/// All defaults are conservative; size `lanes` to the topology reported by
/// [`crate::dispatch::affinity::core_info`] when throughput matters.
#[derive(Clone, Copy, Debug)]
pub struct DispatcherConfig {
    /// Number of lanes (worker threads). Must be > 0.
    pub lanes: usize,
    /// Per-lane inbox capacity. Must be > 0. Blocking submissions stall and
    /// non-blocking ones bounce when a lane's inbox holds this many tasks.
    pub capacity: usize,
    /// Pin each lane's worker to core `lane_index % cores` (best-effort).
    pub pin_workers: bool,
}

impl DispatcherConfig {
    /// Validates the configuration. Panics on invalid values.
    pub fn validate(&self) {
        assert!(self.lanes > 0, "lanes must be > 0");
        assert!(self.capacity > 0, "capacity must be > 0");
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            lanes: 1,
            capacity: 1024,
            pin_workers: false,
        }
    }
}

/// A fixed set of [`Lane`]s plus a pure routing policy.
///
/// - `S`: per-lane state type. Constructed on each worker; never needs
///   `Send`.
/// - `H`: routing hash policy. Defaults to [`RandomState`]: stable within
///   one dispatcher, randomized across dispatchers. Supply a fixed
///   `BuildHasher` via [`Dispatcher::with_hasher`] for reproducible
///   placement.
pub struct Dispatcher<S: 'static, H = RandomState> {
    lanes: Vec<Lane<S>>,
    hasher: H,
}

impl<S: 'static> Dispatcher<S, RandomState> {
    /// Builds a dispatcher with the default routing policy.
    ///
    /// `init` runs once per lane *on that lane's worker thread* to construct
    /// the lane-local state; it receives the lane index.
    ///
    /// # Errors
    ///
    /// The first [`BuildError`] encountered; already-started lanes are
    /// stopped before it is returned.
    pub fn new<F>(config: DispatcherConfig, init: F) -> Result<Self, BuildError>
    where
        F: Fn(usize) -> S + Send + Sync + 'static,
    {
        Self::with_hasher(config, RandomState::new(), init)
    }
}

impl<S: 'static, H: BuildHasher> Dispatcher<S, H> {
    /// Builds a dispatcher with an explicit routing hash policy.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::new`].
    pub fn with_hasher<F>(config: DispatcherConfig, hasher: H, init: F) -> Result<Self, BuildError>
    where
        F: Fn(usize) -> S + Send + Sync + 'static,
    {
        config.validate();

        let init = Arc::new(init);
        let mut lanes = Vec::with_capacity(config.lanes);

        for index in 0..config.lanes {
            let init = Arc::clone(&init);
            match Lane::spawn(config.capacity, index, config.pin_workers, move || {
                init(index)
            }) {
                Ok(lane) => lanes.push(lane),
                Err(err) => {
                    for lane in &mut lanes {
                        lane.stop();
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self { lanes, hasher })
    }

    /// Number of lanes.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// The lane `key` routes to. Pure: constant for this dispatcher's
    /// lifetime.
    #[inline]
    pub fn lane_for<K>(&self, key: &K) -> usize
    where
        K: Hash + ?Sized,
    {
        (self.hasher.hash_one(key) as usize) % self.lanes.len()
    }

    /// Routes `(op, cont)` to `key`'s lane, suspending the caller while that
    /// lane's inbox is full. Never silently drops: on `Ok`, the operation
    /// runs exactly once against the lane's state and the continuation fires
    /// with its result, before `stop()` completes.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Stopped`] after `stop()`.
    pub fn submit_keyed<K, Op, R, C>(&self, key: &K, op: Op, cont: C) -> Result<(), SubmitError>
    where
        K: Hash + ?Sized,
        Op: FnOnce(&mut S) -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        self.lanes[self.lane_for(key)].submit_thunk(bind(op, cont), true)
    }

    /// Non-blocking variant of [`Dispatcher::submit_keyed`].
    ///
    /// # Errors
    ///
    /// [`SubmitError::Full`] when the target lane's inbox is at capacity;
    /// the rejected task has no observable effect. [`SubmitError::Stopped`]
    /// after `stop()`.
    pub fn try_submit_keyed<K, Op, R, C>(&self, key: &K, op: Op, cont: C) -> Result<(), SubmitError>
    where
        K: Hash + ?Sized,
        Op: FnOnce(&mut S) -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        self.lanes[self.lane_for(key)].submit_thunk(bind(op, cont), false)
    }

    /// Submits the same logical task to every lane (blocking on full
    /// inboxes). The operation runs once per lane against that lane's state;
    /// the shared continuation fires once per lane with the lane-local
    /// result, concurrently across workers.
    ///
    /// # Errors
    ///
    /// Best-effort on partial failure: every lane is still attempted, and
    /// the first error is returned — some lanes may run the task even when
    /// this returns an error.
    pub fn submit_broadcast<Op, R, C>(&self, op: Op, cont: C) -> Result<(), SubmitError>
    where
        Op: Fn(&mut S) -> R + Send + Sync + 'static,
        C: Fn(R) + Send + Sync + 'static,
    {
        self.broadcast_inner(op, cont, true)
    }

    /// Non-blocking variant of [`Dispatcher::submit_broadcast`]; lanes with
    /// full inboxes contribute [`SubmitError::Full`].
    pub fn try_submit_broadcast<Op, R, C>(&self, op: Op, cont: C) -> Result<(), SubmitError>
    where
        Op: Fn(&mut S) -> R + Send + Sync + 'static,
        C: Fn(R) + Send + Sync + 'static,
    {
        self.broadcast_inner(op, cont, false)
    }

    fn broadcast_inner<Op, R, C>(&self, op: Op, cont: C, blocking: bool) -> Result<(), SubmitError>
    where
        Op: Fn(&mut S) -> R + Send + Sync + 'static,
        C: Fn(R) + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let cont = Arc::new(cont);

        let mut first_err = None;
        for lane in &self.lanes {
            let op = Arc::clone(&op);
            let cont = Arc::clone(&cont);
            let thunk = bind(move |state: &mut S| (*op)(state), move |r| (*cont)(r));
            if let Err(e) = lane.submit_thunk(thunk, blocking) {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Stops every lane, in lane-index order. Each lane drains its accepted
    /// work before its worker exits. Idempotent.
    pub fn stop(&mut self) {
        for lane in &mut self.lanes {
            lane.stop();
        }
    }
}

impl<S: 'static, H> Drop for Dispatcher<S, H> {
    fn drop(&mut self) {
        for lane in &mut self.lanes {
            lane.stop();
        }
    }
}

impl<S: 'static, H> std::fmt::Debug for Dispatcher<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("lanes", &self.lanes.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
