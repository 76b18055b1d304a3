//! Error types for dispatcher construction and submission.
//!
//! Errors are phase-specific: construction failures carry their OS source and
//! are fatal to the dispatcher being built; submission failures are expected
//! control flow (backpressure, shutdown) and are `Copy`. User-level errors
//! never appear here — an operation's own failures flow through its return
//! value into the continuation.

use std::fmt;
use std::io;

/// Errors from building a dispatcher or a lane.
///
/// When construction fails partway, every already-started lane is stopped
/// before the error is returned; a partially initialized dispatcher is never
/// observable.
#[derive(Debug)]
#[non_exhaustive]
pub enum BuildError {
    /// The OS refused to spawn a lane's worker thread.
    WorkerSpawn { lane: usize, source: io::Error },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerSpawn { lane, source } => {
                write!(f, "failed to spawn worker thread for lane {lane}: {source}")
            }
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn { source, .. } => Some(source),
        }
    }
}

/// Errors from submitting work to a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmitError {
    /// The lane's inbox is at capacity (non-blocking submission only).
    /// The rejected task had no observable effect; the caller may retry or
    /// drop it.
    Full,
    /// The lane has been stopped. Submitting after `stop()` is a caller
    /// error, surfaced as a typed rejection rather than a panic or a
    /// silently dropped task.
    Stopped,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "lane inbox is full"),
            Self::Stopped => write!(f, "lane has been stopped"),
        }
    }
}

impl std::error::Error for SubmitError {}
