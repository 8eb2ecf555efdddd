//! Explicit search context.
//!
//! All global mutable state of the search — the random source, the
//! wall-clock budget, and the start time — lives in a [`SearchContext`]
//! that is threaded through every call instead of process-wide
//! singletons. Time-budget exhaustion is a cooperative cancellation
//! signal ([`TimedOut`]) that unwinds through `?`, not an error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Marker returned when the wall-clock budget is exhausted.
///
/// This is a normal termination path: callers keep the best result
/// produced so far and flush their statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

/// Random source and wall-clock budget for one search run.
#[derive(Debug)]
pub struct SearchContext {
    /// Seeded random source. All randomness in the crate flows through
    /// this generator, so a fixed seed reproduces a run exactly.
    pub rng: StdRng,
    seed: u64,
    started: Instant,
    deadline: Option<Instant>,
}

impl SearchContext {
    /// Creates a context with an optional seed and time limit.
    ///
    /// `None` seeds from entropy; the effective seed is retrievable via
    /// [`seed`](Self::seed) for later reproduction.
    pub fn new(seed: Option<u64>, time_limit: Option<Duration>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        let started = Instant::now();
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            started,
            deadline: time_limit.map(|t| started + t),
        }
    }

    /// The effective random seed of this run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the wall-clock budget is exhausted.
    pub fn time_up(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Budget poll for unbounded loops.
    pub fn check(&self) -> Result<(), TimedOut> {
        if self.time_up() {
            Err(TimedOut)
        } else {
            Ok(())
        }
    }
}

/// Reservoir-samples `k` distinct items from `items`.
///
/// Each item is kept with probability `k / items.len()`. Returns all of
/// `items` when `k >= items.len()`.
pub fn sample_items<T: Copy, R: Rng>(items: &[T], k: usize, rng: &mut R) -> Vec<T> {
    let mut chosen: Vec<T> = items.iter().copied().take(k).collect();
    for i in k..items.len() {
        let j = rng.random_range(0..=i);
        if j < k {
            chosen[j] = items[i];
        }
    }
    chosen
}

/// Reservoir-samples `k` distinct indices from `0..n`.
pub fn sample_indices<R: Rng>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    let mut chosen: Vec<usize> = (0..n.min(k)).collect();
    for i in k..n {
        let j = rng.random_range(0..=i);
        if j < k {
            chosen[j] = i;
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut a = SearchContext::new(Some(7), None);
        let mut b = SearchContext::new(Some(7), None);
        let xs: Vec<u32> = (0..16).map(|_| a.rng.random_range(0..1000)).collect();
        let ys: Vec<u32> = (0..16).map(|_| b.rng.random_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_no_deadline_never_times_out() {
        let ctx = SearchContext::new(Some(1), None);
        assert!(!ctx.time_up());
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let ctx = SearchContext::new(Some(1), Some(Duration::ZERO));
        assert!(ctx.time_up());
        assert_eq!(ctx.check(), Err(TimedOut));
    }

    #[test]
    fn test_sample_indices_distinct_and_in_range() {
        let mut ctx = SearchContext::new(Some(3), None);
        for _ in 0..100 {
            let mut s = sample_indices(20, 5, &mut ctx.rng);
            assert_eq!(s.len(), 5);
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 5, "sampled indices must be distinct");
            assert!(s.iter().all(|&i| i < 20));
        }
    }

    #[test]
    fn test_sample_more_than_available_returns_all() {
        let mut ctx = SearchContext::new(Some(3), None);
        let mut s = sample_indices(4, 10, &mut ctx.rng);
        s.sort_unstable();
        assert_eq!(s, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sample_items_roughly_uniform() {
        let mut ctx = SearchContext::new(Some(11), None);
        let items: Vec<usize> = (0..10).collect();
        let mut counts = [0u32; 10];
        let n = 20_000;
        for _ in 0..n {
            for x in sample_items(&items, 3, &mut ctx.rng) {
                counts[x] += 1;
            }
        }
        // Each item should be picked ~3/10 of the time.
        for &c in &counts {
            assert!(c > 4800 && c < 7200, "counts skewed: {counts:?}");
        }
    }
}
