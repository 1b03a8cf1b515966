//! Randomised subset selection over a corpus.
//!
//! Each call keeps between `ceil(keep_ratio * N)` and `N` items, chosen
//! uniformly, and returns them in a uniformly random order. Callers must
//! sample again for every request; results are never cached.

use rand::Rng;

pub const DEFAULT_KEEP_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    keep_ratio: f64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            keep_ratio: DEFAULT_KEEP_RATIO,
        }
    }
}

impl Sampler {
    /// `keep_ratio` is clamped to `[0, 1]`.
    pub fn new(keep_ratio: f64) -> Self {
        let keep_ratio = if keep_ratio.is_finite() {
            keep_ratio.clamp(0.0, 1.0)
        } else {
            DEFAULT_KEEP_RATIO
        };
        Self { keep_ratio }
    }

    /// Smallest length a sample of `n` items can have.
    pub fn min_len(&self, n: usize) -> usize {
        ((n as f64) * self.keep_ratio).ceil() as usize
    }

    pub fn sample<T: Clone, R: Rng + ?Sized>(&self, items: &[T], rng: &mut R) -> Vec<T> {
        let mut kept = items.to_vec();
        if kept.len() <= 1 {
            return kept;
        }

        let n = kept.len();
        let target = rng.gen_range(self.min_len(n).min(n)..=n);

        while kept.len() > target {
            let idx = rng.gen_range(0..kept.len());
            kept.remove(idx);
        }

        // Fisher-Yates
        for i in (1..kept.len()).rev() {
            let j = rng.gen_range(0..=i);
            kept.swap(i, j);
        }

        kept
    }
}
