//! Seeded RNG service
//!
//! The orchestrator owns exactly one [`KernelRng`]; every stochastic
//! decision in a run draws from it in a fixed visitation order. The handle
//! counts its draws so tests can assert that two code paths consume the
//! stream identically.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The kernel's single seeded random source.
#[derive(Debug, Clone)]
pub struct KernelRng {
    inner: StdRng,
    draws: u64,
}

impl KernelRng {
    pub fn seed_from(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Uniform draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.draws += 1;
        self.inner.gen::<f64>()
    }

    /// Bernoulli draw: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform index in [0, n). Panics if n == 0 (caller checks emptiness).
    pub fn index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "index() requires a non-empty range");
        self.draws += 1;
        self.inner.gen_range(0..n)
    }

    /// Uniform integer in the inclusive range [lo, hi].
    pub fn int_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        self.draws += 1;
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform draw in [lo, hi).
    pub fn range_f64(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    /// In-place Fisher-Yates shuffle. Consumes exactly `len - 1` draws for
    /// any non-empty slice, so visitation-order replay stays aligned.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }

    /// Pick one element uniformly. Returns None on an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.index(items.len())])
        }
    }

    /// Number of draws consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}
