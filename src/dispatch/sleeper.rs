//! Adaptive idle backoff for lane workers.
//!
//! # Purpose
//!
//! A lane worker that finds its inbox empty has to decide how hard to wait.
//! Spinning forever wins the latency race and burns a core; parking
//! on a timeout does the opposite. This module implements the tiered policy
//! in between: the first idle iteration is a bare scheduler yield (the common
//! case — an empty slot between bursts), and each further consecutive idle
//! iteration escalates through short timed sleeps up to a hard 1 ms cap, so
//! wake latency stays bounded during true idleness.
//!
//! # Schedule
//!
//! | consecutive idle iterations `n` | action |
//! |---------------------------------|--------|
//! | 0 | `thread::yield_now()` |
//! | 1..=10 | sleep 1 µs |
//! | 11..=20 | sleep 10 µs |
//! | 21..=30 | sleep 100 µs |
//! | >30 | sleep 1 ms (cap) |
//!
//! Sleep durations are lower bounds; the OS may sleep longer. Any executed
//! task resets the schedule to the yield tier.
//!
//! # Correctness Invariants
//!
//! - The pause is monotonically non-decreasing in `n` until the cap.
//! - The pause never exceeds 1 ms; the worker never parks unboundedly.
//! - `sleep()` and `reset()` never fail and never panic.
//!
//! The tier table is a pure function of the counter ([`AdaptiveSleeper::pause_for`])
//! so tests verify the schedule without timing flakiness.

use std::thread;
use std::time::Duration;

/// Per-worker idle-backoff state machine.
///
/// Worker-local by design: each lane owns one, and nothing about it is
/// shared or atomic.
#[derive(Clone, Debug, Default)]
pub struct AdaptiveSleeper {
    /// Consecutive idle iterations since the last executed task.
    idle_iters: u64,
}

impl AdaptiveSleeper {
    /// Creates a sleeper at the yield tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause for the tier identified by `n`. `None` means a bare yield.
    pub(crate) fn pause_for(n: u64) -> Option<Duration> {
        match n {
            0 => None,
            1..=10 => Some(Duration::from_micros(1)),
            11..=20 => Some(Duration::from_micros(10)),
            21..=30 => Some(Duration::from_micros(100)),
            _ => Some(Duration::from_millis(1)),
        }
    }

    /// Performs the pause for the current tier, then escalates.
    pub fn sleep(&mut self) {
        match Self::pause_for(self.idle_iters) {
            None => thread::yield_now(),
            Some(d) => thread::sleep(d),
        }
        self.idle_iters = self.idle_iters.saturating_add(1);
    }

    /// Resets the schedule to the yield tier. Called after any executed task.
    #[inline]
    pub fn reset(&mut self) {
        self.idle_iters = 0;
    }

    /// Current consecutive-idle count (for debugging and tests).
    #[inline]
    pub fn idle_iters(&self) -> u64 {
        self.idle_iters
    }
}

// ============================================================================
// Tests
// ============================================================================
