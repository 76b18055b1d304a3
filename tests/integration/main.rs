//! Integration tests for the laneq dispatcher.
//!
//! Run with: `cargo test --test integration`

mod pipeline;
mod shutdown;

use std::hash::{BuildHasher, Hasher};

/// Fixed routing policy shared by the scenario tests: interprets the hashed
/// bytes as a little-endian integer and multiplies by 1009, so small integer
/// keys land on distinct, predictable lanes.
#[derive(Clone, Default)]
pub struct StrideHash;

pub struct StrideHasher(u64);

impl BuildHasher for StrideHash {
    type Hasher = StrideHasher;
    fn build_hasher(&self) -> StrideHasher {
        StrideHasher(0)
    }
}

impl Hasher for StrideHasher {
    fn finish(&self) -> u64 {
        self.0.wrapping_mul(1009)
    }
    fn write(&mut self, bytes: &[u8]) {
        let mut buf = [0u8; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        self.0 = u64::from_le_bytes(buf);
    }
}
