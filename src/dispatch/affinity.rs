//! Best-effort CPU affinity for lane workers.
//!
//! # Purpose
//!
//! Pinning each lane's worker to one logical core keeps the lane's state hot
//! in that core's cache and avoids migration overhead. It is an optimization,
//! never a correctness dependency: when pinning is unavailable (macOS,
//! sandboxes, some container runtimes) the runtime logs one warning and runs
//! unpinned.
//!
//! # Platform Support
//!
//! - **Linux**: full support via `pthread_setaffinity_np` on the calling
//!   thread. Respects cgroup/cpuset constraints — in a container pinned to
//!   CPUs 4-7, pinning to core 0 fails even though the host has one; the
//!   failure is logged once and ignored.
//! - **Other platforms**: `pin_current_thread_to_core` returns
//!   `ErrorKind::Unsupported` and [`bind_lane_worker`] degrades to a
//!   warn-once no-op.
//!
//! # Topology
//!
//! [`core_info`] reports logical performance/efficiency core counts so
//! callers can pick a sensible lane count. Platforms that do not distinguish
//! core kinds report total hardware concurrency as performance cores.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Maximum core index accepted by the affinity API.
///
/// This is `CPU_SETSIZE` on Linux (typically 1024). Core indices must be
/// below this value to keep the `CPU_SET` macro in bounds.
#[cfg(target_os = "linux")]
pub const CPU_SET_CAPACITY: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(not(target_os = "linux"))]
pub const CPU_SET_CAPACITY: usize = 1024;

/// Reported core topology.
///
/// Advisory only: used by callers to choose a lane count, never consulted
/// for correctness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreInfo {
    /// Logical performance cores (all cores where the platform does not
    /// distinguish kinds).
    pub performance_cores: usize,
    /// Logical efficiency cores (0 where the platform does not distinguish).
    pub efficiency_cores: usize,
}

impl CoreInfo {
    /// Total logical cores across both kinds.
    pub fn total(&self) -> usize {
        self.performance_cores + self.efficiency_cores
    }
}

/// Best-effort topology query.
///
/// Linux and the portable fallback report `available_parallelism()` as
/// performance cores: the kernel does not expose a stable P/E split, and
/// `available_parallelism` already respects cgroup limits. Never fails;
/// reports one performance core when the count cannot be determined.
pub fn core_info() -> CoreInfo {
    CoreInfo {
        performance_cores: num_cpus(),
        efficiency_cores: 0,
    }
}

/// Number of CPUs available to this process.
///
/// Uses `std::thread::available_parallelism()`, which respects cgroup CPU
/// limits and processor affinity. Falls back to 1 with a warning when the
/// count cannot be determined.
pub fn num_cpus() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            eprintln!("WARN: could not determine CPU count ({e}), defaulting to 1");
            1
        }
    }
}

#[inline]
fn validate_core(core: usize) -> io::Result<()> {
    if core >= CPU_SET_CAPACITY {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core index {core} exceeds CPU_SET_CAPACITY ({CPU_SET_CAPACITY})"),
        ));
    }
    Ok(())
}

/// Pins the calling thread to `core`.
///
/// # Errors
///
/// - `core >= CPU_SET_CAPACITY` (would make the `CPU_SET` macro write out of
///   bounds)
/// - the core is not in the process's allowed CPU set (cgroups/cpuset)
/// - the platform does not support per-thread affinity (`Unsupported`)
#[cfg(target_os = "linux")]
pub fn pin_current_thread_to_core(core: usize) -> io::Result<()> {
    validate_core(core)?;

    // SAFETY:
    // - a zeroed cpu_set_t is valid and CPU_ZERO re-clears it
    // - core < CPU_SET_CAPACITY keeps CPU_SET in bounds
    // - pthread_setaffinity_np returns its error code directly (not via errno)
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);

        let rc = libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set as *const _,
        );
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread_to_core(core: usize) -> io::Result<()> {
    validate_core(core)?;
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "per-thread CPU affinity is not supported on this platform",
    ))
}

// One latch per failure reason so each warning prints once per process.
static UNSUPPORTED_WARNED: AtomicBool = AtomicBool::new(false);
static BIND_FAILED_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_once(latch: &AtomicBool, message: impl FnOnce() -> String) {
    if !latch.swap(true, Ordering::Relaxed) {
        eprintln!("WARN: {}", message());
    }
}

/// Binds the calling lane worker to the core for `lane_index`.
///
/// The core is `lane_index % available cores`, so lane counts larger than
/// the machine wrap instead of failing. Failure is non-fatal: each failure
/// reason (platform unsupported vs. OS error) is logged once per process and
/// the worker runs unpinned.
///
/// Returns the core the thread was pinned to, or `None` when pinning did not
/// take effect.
pub fn bind_lane_worker(lane_index: usize) -> Option<usize> {
    let cores = num_cpus().max(1);
    let core = lane_index % cores;

    match pin_current_thread_to_core(core) {
        Ok(()) => Some(core),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => {
            warn_once(&UNSUPPORTED_WARNED, || {
                "thread affinity is not supported on this platform; lanes run unpinned".to_string()
            });
            None
        }
        Err(e) => {
            warn_once(&BIND_FAILED_WARNED, || {
                format!("failed to pin lane {lane_index} to core {core}: {e}; continuing unpinned")
            });
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
