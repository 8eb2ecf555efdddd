//! Incremental variance-of-lot-value tracking.
//!
//! The objective is the variance of per-lot aggregate value, kept in
//! integer arithmetic as `Σx² − (Σx)²/lots` over the per-lot sums. The
//! tracker supports O(1) hypothetical single-cell moves and amortized
//! O(1) batch commits; every path must agree with the brute-force
//! recomputation within rounding.

/// Hypothetical new tracker state after a single-cell move.
///
/// Produced by [`ObjectiveTracker::evaluate_move`] (pure) and applied
/// by [`ObjectiveTracker::commit_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveDelta {
    /// Objective value after the move.
    pub value: i64,
    sum: i64,
    sum_sq: i64,
}

/// Running sums of per-lot aggregate value.
#[derive(Debug, Clone)]
pub struct ObjectiveTracker {
    lots: usize,
    lot_value: Vec<i64>,
    sum: i64,
    sum_sq: i64,
    value: i64,
}

impl ObjectiveTracker {
    /// Creates a zeroed tracker for `lots` lots.
    ///
    /// # Panics
    /// Panics if `lots` is zero.
    pub fn new(lots: usize) -> Self {
        assert!(lots > 0, "objective tracker needs at least one lot");
        Self {
            lots,
            lot_value: vec![0; lots],
            sum: 0,
            sum_sq: 0,
            value: 0,
        }
    }

    /// Zeroes all running sums.
    pub fn reset(&mut self) {
        self.lot_value.fill(0);
        self.sum = 0;
        self.sum_sq = 0;
        self.value = 0;
    }

    /// Current objective value (lower is fairer).
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Aggregate value currently attributed to each lot.
    pub fn lot_values(&self) -> &[i64] {
        &self.lot_value
    }

    /// Evaluates moving a cell of value `cell_value` out of `from`
    /// and/or into `to` without mutating the tracker.
    pub fn evaluate_move(
        &self,
        from: Option<usize>,
        to: Option<usize>,
        cell_value: i64,
    ) -> ObjectiveDelta {
        let x = cell_value;
        let mut sum = self.sum;
        let mut sum_sq = self.sum_sq;
        if let Some(from) = from {
            let v = self.lot_value[from];
            sum_sq += -(v * v) + (v - x) * (v - x);
            sum -= x;
        }
        if let Some(to) = to {
            let v = self.lot_value[to];
            sum_sq += -(v * v) + (v + x) * (v + x);
            sum += x;
        }
        ObjectiveDelta {
            value: sum_sq - (sum * sum) / self.lots as i64,
            sum,
            sum_sq,
        }
    }

    /// Applies a move previously evaluated with the same arguments.
    pub fn commit_move(
        &mut self,
        from: Option<usize>,
        to: Option<usize>,
        cell_value: i64,
        delta: ObjectiveDelta,
    ) {
        if let Some(from) = from {
            self.lot_value[from] -= cell_value;
        }
        if let Some(to) = to {
            self.lot_value[to] += cell_value;
        }
        self.sum = delta.sum;
        self.sum_sq = delta.sum_sq;
        self.value = delta.value;
        self.debug_check();
    }

    /// Commits a batch of cell-to-lot additions.
    ///
    /// `batch_len` is the size of the originating batch including
    /// dropped entries; `moves` yields the `(lot, cell_value)` pairs
    /// that actually commit. Small batches take the incremental path;
    /// batches touching most lots recompute the sums from scratch,
    /// which is cheaper.
    pub fn commit_batch(
        &mut self,
        batch_len: usize,
        moves: impl Iterator<Item = (usize, i64)>,
    ) {
        if batch_len < self.lots {
            for (lot, x) in moves {
                let v = self.lot_value[lot];
                self.sum_sq += -(v * v) + (v + x) * (v + x);
                self.sum += x;
                self.lot_value[lot] += x;
            }
        } else {
            for (lot, x) in moves {
                self.lot_value[lot] += x;
            }
            self.sum = 0;
            self.sum_sq = 0;
            for &v in &self.lot_value {
                self.sum += v;
                self.sum_sq += v * v;
            }
        }
        self.value = self.sum_sq - (self.sum * self.sum) / self.lots as i64;
        self.debug_check();
    }

    /// Rebuilds all sums from a full assignment.
    pub fn rebuild(&mut self, assigned: &[usize], values: &[i64]) {
        self.lot_value.fill(0);
        for (cell, &lot) in assigned.iter().enumerate() {
            if lot != crate::grid::NO_LOT {
                self.lot_value[lot] += values[cell];
            }
        }
        self.sum = 0;
        self.sum_sq = 0;
        for &v in &self.lot_value {
            self.sum += v;
            self.sum_sq += v * v;
        }
        self.value = self.sum_sq - (self.sum * self.sum) / self.lots as i64;
        self.debug_check();
    }

    /// Recomputes the variance directly from the per-lot sums.
    ///
    /// Accumulates in `f64`; the incremental integer value is expected
    /// to agree within an absolute tolerance of 2.
    pub fn brute_force_value(&self) -> i64 {
        let mean = self.lot_value.iter().sum::<i64>() as f64 / self.lots as f64;
        let mut var = 0.0;
        for &v in &self.lot_value {
            let d = v as f64 - mean;
            var += d * d;
        }
        var as i64
    }

    fn debug_check(&self) {
        debug_assert!(
            (self.value - self.brute_force_value()).abs() < 2,
            "incremental objective {} drifted from brute force {}",
            self.value,
            self.brute_force_value()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NO_LOT;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_new_is_zeroed() {
        let t = ObjectiveTracker::new(3);
        assert_eq!(t.value(), 0);
        assert_eq!(t.lot_values(), &[0, 0, 0]);
    }

    #[test]
    fn test_evaluate_is_pure() {
        let mut t = ObjectiveTracker::new(2);
        t.rebuild(&[0, 1, 1], &[5, 3, 4]);
        let before = t.clone();
        let _ = t.evaluate_move(Some(1), Some(0), 4);
        assert_eq!(t.value(), before.value());
        assert_eq!(t.lot_values(), before.lot_values());
    }

    #[test]
    fn test_evaluate_then_commit_matches_rebuild() {
        let values = [5, 3, 4, 7];
        let mut t = ObjectiveTracker::new(2);
        t.rebuild(&[0, 1, 1, NO_LOT], &values);

        // Move cell 2 (value 4) from lot 1 to lot 0.
        let delta = t.evaluate_move(Some(1), Some(0), values[2]);
        t.commit_move(Some(1), Some(0), values[2], delta);

        let mut fresh = ObjectiveTracker::new(2);
        fresh.rebuild(&[0, 1, 0, NO_LOT], &values);
        assert_eq!(t.value(), fresh.value());
        assert_eq!(t.lot_values(), fresh.lot_values());
    }

    #[test]
    fn test_assign_only_move() {
        let values = [5, 3];
        let mut t = ObjectiveTracker::new(2);
        t.rebuild(&[0, NO_LOT], &values);
        let delta = t.evaluate_move(None, Some(1), values[1]);
        t.commit_move(None, Some(1), values[1], delta);

        let mut fresh = ObjectiveTracker::new(2);
        fresh.rebuild(&[0, 1], &values);
        assert_eq!(t.value(), fresh.value());
    }

    #[test]
    fn test_equal_lot_values_give_zero() {
        let mut t = ObjectiveTracker::new(4);
        t.rebuild(&[0, 1, 2, 3], &[6, 6, 6, 6]);
        assert_eq!(t.value(), 0);
    }

    #[test]
    fn test_batch_incremental_and_scratch_paths_agree() {
        let values: Vec<i64> = vec![2, 9, 4, 1, 8, 3, 7, 5];
        let moves: Vec<(usize, i64)> = vec![(0, 2), (1, 9), (2, 4), (0, 1)];

        // Incremental path: batch smaller than lot count.
        let mut small = ObjectiveTracker::new(5);
        small.commit_batch(moves.len(), moves.iter().copied());

        // Scratch path: batch at least as large as lot count.
        let mut large = ObjectiveTracker::new(3);
        large.commit_batch(moves.len(), moves.iter().copied());

        let mut check5 = ObjectiveTracker::new(5);
        let mut check3 = ObjectiveTracker::new(3);
        let assigned = [0, 1, 2, 0, NO_LOT, NO_LOT, NO_LOT, NO_LOT];
        check5.rebuild(&assigned, &values);
        check3.rebuild(&assigned, &values);
        assert_eq!(small.value(), check5.value());
        assert_eq!(large.value(), check3.value());
    }

    #[test]
    fn test_random_move_sequence_tracks_brute_force() {
        let mut rng = StdRng::seed_from_u64(99);
        let lots = 5;
        let nland = 40;
        let values: Vec<i64> = (0..nland).map(|_| rng.random_range(1..50)).collect();
        let mut assigned = vec![NO_LOT; nland];
        let mut t = ObjectiveTracker::new(lots);

        for _ in 0..500 {
            let cell = rng.random_range(0..nland);
            let from = (assigned[cell] != NO_LOT).then_some(assigned[cell]);
            let to = rng.random_range(0..lots);
            let to = (from != Some(to)).then_some(to);
            let delta = t.evaluate_move(from, to, values[cell]);
            t.commit_move(from, to, values[cell], delta);
            assigned[cell] = to.unwrap_or(NO_LOT);

            let mut fresh = ObjectiveTracker::new(lots);
            fresh.rebuild(&assigned, &values);
            assert_eq!(t.value(), fresh.value());
            assert!((t.value() - t.brute_force_value()).abs() < 2);
        }
    }
}
