//! A lane: one worker thread, one owned state object, one inbox.
//!
//! # Architecture
//!
//! ```text
//!   producers                                lane worker (pinned, optional)
//!   ─────────                                ──────────────────────────────
//!   submit(op, cont) ──► bind ──► Thunk ──►  ┌──────────────────────────┐
//!   try_submit(..)        │                  │ loop:                    │
//!                         ▼                  │   drain inbox:           │
//!                   MpmcRing<Thunk>  ──────► │     thunk(&mut state)    │
//!                   (bounded inbox)          │     sleeper.reset()      │
//!                                            │   exit check (below)     │
//!                                            │   sleeper.sleep()        │
//!                                            └──────────────────────────┘
//! ```
//!
//! The state object is constructed *on* the worker thread and never leaves
//! it: the `Send` boundary is crossed exactly once, by the `init` closure at
//! construction. The state type itself does not need `Send`. Continuations
//! run on the worker in execution order, so thunks submitted by one thread
//! execute — and complete — in submission order.
//!
//! # Shutdown protocol
//!
//! `stop()` must guarantee that every submission that returned `Ok` executes
//! before the worker exits, while submissions after `stop()` get a typed
//! rejection. A bare `running` flag has a TOCTOU hole:
//!
//! ```text
//! // BROKEN with a lone flag:
//! producer: running? yes ──┐
//! stopper:  running = false │
//! worker:   drain, see !running, exit
//! producer: └─► enqueue      // Ok returned, task never runs
//! ```
//!
//! The fix brackets every submission with an in-flight counter:
//!
//! ```text
//! producer: submits_in_flight += 1
//!           running?  no → -= 1, Err(Stopped)
//!                     yes → enqueue; submits_in_flight -= 1
//! worker:   exits only when !running AND submits_in_flight == 0
//!           AND the inbox is empty, then drains once more
//! ```
//!
//! All three shutdown atomics are `SeqCst`, which makes the two races
//! mutually exclusive: if a producer saw `running == true`, its increment
//! precedes the worker's counter read in the single total order, so the
//! worker waits for it; if the worker saw the counter at zero, every later
//! producer is forced to observe `running == false` and bail out.
//!
//! # Failure semantics
//!
//! A panicking thunk is caught on the worker, logged with the lane index,
//! and the worker continues; the inbox is never corrupted. The state is
//! assumed to be left valid by its own operations — there is no rollback.
//! A panic *of the worker thread itself* (which the catch makes unreachable
//! from user code) is logged at join time and `stop()` still returns.
//!
//! # Reentrancy
//!
//! Continuations run on the worker. They must be short and must not
//! blocking-submit into their own lane: with a full inbox that is a deadlock
//! (the worker would wait on itself). Submitting into *other* lanes or
//! dispatchers from a continuation is fine and is how pipelines are built.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::dispatch::affinity;
use crate::dispatch::error::{BuildError, SubmitError};
use crate::dispatch::sleeper::AdaptiveSleeper;
use crate::dispatch::task::{bind, Thunk};
use crate::stdx::MpmcRing;

/// State shared between a lane's handle (producer side) and its worker.
struct LaneShared<S: 'static> {
    inbox: MpmcRing<Thunk<S>>,
    /// True from construction until the first `stop()`. Transitions
    /// true→false exactly once.
    running: AtomicBool,
    /// Submissions currently between their `running` check and their
    /// enqueue. The worker refuses to exit while this is non-zero.
    submits_in_flight: AtomicUsize,
}

/// One worker thread with exclusive ownership of a state object, fed by a
/// bounded inbox.
///
/// Dropping a lane stops it: the worker drains accepted work, then exits and
/// is joined.
pub struct Lane<S: 'static> {
    index: usize,
    shared: Arc<LaneShared<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: 'static> Lane<S> {
    /// Starts a lane.
    ///
    /// `init` is called once on the worker thread to construct the owned
    /// state; it is the only thing that crosses the `Send` boundary. When
    /// `pin_worker` is set the worker binds itself to core
    /// `index % available cores` (best-effort, see [`affinity`]).
    ///
    /// # Errors
    ///
    /// [`BuildError::WorkerSpawn`] when the OS refuses the thread.
    pub fn spawn<F>(
        capacity: usize,
        index: usize,
        pin_worker: bool,
        init: F,
    ) -> Result<Self, BuildError>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let shared = Arc::new(LaneShared {
            inbox: MpmcRing::with_capacity(capacity),
            running: AtomicBool::new(true),
            submits_in_flight: AtomicUsize::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("lane-{index}"))
            .spawn(move || {
                if pin_worker {
                    let _ = affinity::bind_lane_worker(index);
                }
                let mut state = init();
                worker_loop(index, &worker_shared, &mut state);
            })
            .map_err(|source| BuildError::WorkerSpawn { lane: index, source })?;

        Ok(Self {
            index,
            shared,
            worker: Some(worker),
        })
    }

    /// Submits `(op, cont)`, suspending the caller until inbox space is
    /// available. Returns only after the thunk is enqueued.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Stopped`] after `stop()`.
    pub fn submit<Op, R, C>(&self, op: Op, cont: C) -> Result<(), SubmitError>
    where
        Op: FnOnce(&mut S) -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        self.submit_thunk(bind(op, cont), true)
    }

    /// Non-blocking variant of [`Lane::submit`].
    ///
    /// # Errors
    ///
    /// [`SubmitError::Full`] when the inbox is at capacity (the rejected
    /// task has no observable effect), [`SubmitError::Stopped`] after
    /// `stop()`.
    pub fn try_submit<Op, R, C>(&self, op: Op, cont: C) -> Result<(), SubmitError>
    where
        Op: FnOnce(&mut S) -> R + Send + 'static,
        C: FnOnce(R) + Send + 'static,
    {
        self.submit_thunk(bind(op, cont), false)
    }

    /// Enqueues an already-bound thunk. Shared by the keyed and broadcast
    /// paths of the dispatcher.
    pub(crate) fn submit_thunk(&self, thunk: Thunk<S>, blocking: bool) -> Result<(), SubmitError> {
        let shared = &*self.shared;

        shared.submits_in_flight.fetch_add(1, Ordering::SeqCst);
        if !shared.running.load(Ordering::SeqCst) {
            shared.submits_in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(SubmitError::Stopped);
        }

        let result = if blocking {
            shared.inbox.push(thunk);
            Ok(())
        } else {
            shared.inbox.try_push(thunk).map_err(|_| SubmitError::Full)
        };

        shared.submits_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl<S: 'static> Lane<S> {
    /// This lane's id, also its affinity target.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the lane still accepts submissions.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stops the lane: flips `running`, waits for the worker to drain every
    /// accepted submission, and joins it. Idempotent; second and later calls
    /// are no-ops.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::SeqCst);

        let thread_id = handle.thread().id();
        if let Err(payload) = handle.join() {
            eprintln!(
                "ERROR: failed to join worker for lane {} (thread {:?}): {}",
                self.index,
                thread_id,
                panic_message(payload.as_ref())
            );
        }
    }
}

impl<S: 'static> Drop for Lane<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: 'static> std::fmt::Debug for Lane<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("index", &self.index)
            .field("running", &self.shared.running.load(Ordering::SeqCst))
            .finish()
    }
}

/// Main worker loop. See the module docs for the exit protocol.
fn worker_loop<S: 'static>(index: usize, shared: &LaneShared<S>, state: &mut S) {
    let mut sleeper = AdaptiveSleeper::new();

    loop {
        while let Some(thunk) = shared.inbox.try_pop() {
            run_thunk(index, thunk, state);
            sleeper.reset();
        }

        if !shared.running.load(Ordering::SeqCst)
            && shared.submits_in_flight.load(Ordering::SeqCst) == 0
        {
            // A submission that won the race against stop() may have landed
            // between the drain above and the checks. Nothing new can arrive
            // past this point, so one more drain empties the lane for good.
            while let Some(thunk) = shared.inbox.try_pop() {
                run_thunk(index, thunk, state);
            }
            return;
        }

        sleeper.sleep();
    }
}

/// Runs one thunk under `catch_unwind` so a panicking task cannot take the
/// lane down with it.
fn run_thunk<S: 'static>(index: usize, thunk: Thunk<S>, state: &mut S) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| thunk(state))) {
        eprintln!(
            "ERROR: lane {index}: task panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// Extracts the human-readable part of a panic payload, if there is one.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

// ============================================================================
// Tests
// ============================================================================
