//! Small, self-contained concurrency primitives the dispatcher is built on.
//!
//! # Scope
//! `stdx` hosts narrow utilities with no knowledge of lanes, thunks, or
//! routing, so they stay reusable and testable in isolation. The dispatch
//! layer composes them; it never reaches around them.

pub mod mpmc_ring;

pub use mpmc_ring::MpmcRing;
