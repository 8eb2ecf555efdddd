//! Batched greedy construction.
//!
//! Completes a partial assignment by frontier growth: every unassigned
//! cell adjacent to a lot is a [`Candidate`] for that lot, candidates
//! are partially ordered by the trackers' projected deltas, and the
//! best batch is committed at once. Newly assigned cells enqueue their
//! unassigned neighbors as fresh candidates of the same lot.
//!
//! Diversified mode (used by mutation) widens the selection window by a
//! multiplier and randomly swaps widened candidates into the batch.

use crate::context::{SearchContext, TimedOut};
use crate::grid::Grid;
use crate::solution::Solution;
use rand::Rng;
use std::cmp::Ordering;

/// A prospective `(lot, cell)` assignment.
///
/// Carries lazily computed projected deltas for the fairness excess,
/// the thresholded size ratio, and the objective value. The deltas are
/// stamped with the owning solution's mutation counter and recomputed
/// only when stale.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Target lot.
    pub lot: usize,
    /// Cell to assign.
    pub cell: usize,
    pub(crate) stamp: usize,
    pub(crate) projected_excess: i64,
    pub(crate) projected_ratio: i64,
    pub(crate) projected_value: i64,
}

impl Candidate {
    /// Creates a candidate with stale (never computed) deltas.
    pub fn new(lot: usize, cell: usize) -> Self {
        Self {
            lot,
            cell,
            stamp: usize::MAX,
            projected_excess: 0,
            projected_ratio: 0,
            projected_value: 0,
        }
    }

    /// Whether this candidate was dropped during a commit.
    pub fn is_dropped(&self) -> bool {
        self.cell == usize::MAX
    }

    pub(crate) fn invalidate(&mut self) {
        self.cell = usize::MAX;
    }
}

/// Parameters of the constructive heuristic.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildConfig {
    /// Number of candidates committed per growth round.
    pub batch_size: usize,

    /// Window multiplier for diversified construction. The best
    /// `batch_size × ⌊greedy_alpha⌋` candidates form the pool the batch
    /// is randomly drawn from.
    pub greedy_alpha: f64,

    /// Largest-to-smallest lot area ratio tolerated without penalty.
    pub max_size_ratio: i64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            greedy_alpha: 3.0,
            max_size_ratio: 3,
        }
    }
}

impl BuildConfig {
    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the diversification window multiplier.
    pub fn with_greedy_alpha(mut self, alpha: f64) -> Self {
        self.greedy_alpha = alpha;
        self
    }

    /// Sets the tolerated size ratio.
    pub fn with_max_size_ratio(mut self, ratio: i64) -> Self {
        self.max_size_ratio = ratio;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size < 1 {
            return Err("batch_size must be at least 1".into());
        }
        if self.greedy_alpha < 1.0 {
            return Err("greedy_alpha must be at least 1.0".into());
        }
        if self.max_size_ratio < 1 {
            return Err("max_size_ratio must be at least 1".into());
        }
        Ok(())
    }
}

/// The region-growing constructive heuristic.
///
/// Owns its candidate buffers so repeated constructions reuse the same
/// allocations.
#[derive(Debug, Default)]
pub struct Constructive {
    cands: Vec<Candidate>,
    accepted: Vec<Candidate>,
}

impl Constructive {
    /// Creates a heuristic with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns one seed cell per lot, then grows to completion.
    ///
    /// Seeds must be distinct unassigned cells, one per lot.
    pub fn construct_from_seeds(
        &mut self,
        sol: &mut Solution,
        seeds: &[usize],
        diversify: bool,
        grid: &Grid,
        cfg: &BuildConfig,
        ctx: &mut SearchContext,
    ) -> Result<(), TimedOut> {
        debug_assert_eq!(seeds.len(), grid.lots);
        debug_assert!(
            (0..seeds.len()).all(|i| (0..i).all(|j| seeds[i] != seeds[j])),
            "seeds must be distinct"
        );
        let mut initial: Vec<Candidate> = seeds
            .iter()
            .enumerate()
            .map(|(lot, &cell)| Candidate::new(lot, cell))
            .collect();
        sol.apply_batch(&mut initial, grid);
        self.construct(sol, diversify, grid, cfg, ctx)
    }

    /// Grows the partial assignment in `sol` until every cell is
    /// assigned or the time budget runs out.
    pub fn construct(
        &mut self,
        sol: &mut Solution,
        diversify: bool,
        grid: &Grid,
        cfg: &BuildConfig,
        ctx: &mut SearchContext,
    ) -> Result<(), TimedOut> {
        debug_assert!(cfg.validate().is_ok());
        self.cands.clear();

        // Seed the candidate list from the frontier of the partial
        // assignment.
        if sol.num_assigned() != grid.nland {
            for cell in 0..grid.nland {
                if sol.is_assigned(cell) {
                    continue;
                }
                if let Some(&nb) = grid.neighbors[cell].iter().find(|&&nb| sol.is_assigned(nb)) {
                    self.cands
                        .push(Candidate::new(sol.assigned()[nb], cell));
                }
            }
        }

        let bs = cfg.batch_size;
        while !self.cands.is_empty() {
            ctx.check()?;

            let len = self.cands.len();
            let window = bs * if diversify { cfg.greedy_alpha as usize } else { 1 };
            let last = len.saturating_sub(window);
            if last > 0 {
                for cand in self.cands.iter_mut() {
                    sol.refresh_candidate(cand, grid, cfg.max_size_ratio);
                }
                // Partial selection only: the best `window` candidates
                // end up in the tail, in no particular order.
                let sol_ref: &Solution = sol;
                self.cands
                    .select_nth_unstable_by(last, |a, b| cmp_candidates(b, a, sol_ref));
                if diversify {
                    // Randomly swap widened candidates into the batch.
                    let start = len - bs;
                    let mut a = start + 1;
                    while a > last {
                        a -= 1;
                        let j = ctx.rng.random_range(a..len);
                        if j >= start {
                            self.cands.swap(j, a);
                        }
                    }
                }
            }

            self.accepted.clear();
            for i in len.saturating_sub(bs)..len {
                if !sol.is_assigned(self.cands[i].cell) {
                    self.accepted.push(self.cands[i]);
                }
            }
            self.cands.truncate(len.saturating_sub(bs));
            sol.apply_batch(&mut self.accepted, grid);
            for i in 0..self.accepted.len() {
                let c = self.accepted[i];
                if c.is_dropped() {
                    continue;
                }
                for &nb in &grid.neighbors[c.cell] {
                    if !sol.is_assigned(nb) {
                        self.cands.push(Candidate::new(c.lot, nb));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Candidate ranking: already-assigned candidates first (so they are
/// selected and flushed), then ascending projected fairness excess,
/// thresholded size ratio, objective value, and finally cell index for
/// determinism. Requires fresh deltas.
fn cmp_candidates(a: &Candidate, b: &Candidate, sol: &Solution) -> Ordering {
    match (sol.is_assigned(a.cell), sol.is_assigned(b.cell)) {
        (true, true) => a.cell.cmp(&b.cell),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => (a.projected_excess, a.projected_ratio, a.projected_value, a.cell)
            .cmp(&(b.projected_excess, b.projected_ratio, b.projected_value, b.cell)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridOptions;
    use rand::Rng;

    fn uniform_grid(rows: usize, cols: usize, lots: usize) -> Grid {
        let mut text = format!("{rows} {cols} {lots} 1 0\n");
        for _ in 0..rows * cols {
            text.push_str("1 ");
        }
        Grid::parse_str(&text, &GridOptions::default()).unwrap()
    }

    fn ctx(seed: u64) -> SearchContext {
        SearchContext::new(Some(seed), None)
    }

    #[test]
    fn test_uniform_grid_converges_to_equal_lots() {
        // A river-free 10×10 grid with uniform value and four seeds in
        // the quadrant centers must settle into four 25-cell lots with
        // zero objective value.
        let g = uniform_grid(10, 10, 4);
        let seeds = [
            g.index_at(2, 2).unwrap(),
            g.index_at(2, 7).unwrap(),
            g.index_at(7, 2).unwrap(),
            g.index_at(7, 7).unwrap(),
        ];
        let mut sol = Solution::new(&g);
        let mut cons = Constructive::new();
        // Batch size 1 re-ranks after every cell, so growth strictly
        // follows the smallest-aggregate lot and the fill stays balanced.
        let cfg = BuildConfig::default().with_batch_size(1);
        let mut ctx = ctx(42);
        cons.construct_from_seeds(&mut sol, &seeds, false, &g, &cfg, &mut ctx)
            .unwrap();

        assert_eq!(sol.num_assigned(), 100);
        assert_eq!(sol.area(), [25, 25, 25, 25]);
        assert_eq!(sol.value(), 0);
        sol.validate(&g).unwrap();
    }

    #[test]
    fn test_construction_covers_and_connects() {
        let g = uniform_grid(8, 6, 3);
        let seeds = [
            g.index_at(0, 0).unwrap(),
            g.index_at(4, 3).unwrap(),
            g.index_at(7, 5).unwrap(),
        ];
        let mut sol = Solution::new(&g);
        let mut cons = Constructive::new();
        let cfg = BuildConfig::default().with_batch_size(4);
        let mut ctx = ctx(7);
        cons.construct_from_seeds(&mut sol, &seeds, false, &g, &cfg, &mut ctx)
            .unwrap();
        assert_eq!(sol.num_assigned(), g.nland);
        assert!(sol.area().iter().all(|&a| a > 0));
        sol.validate(&g).unwrap();
    }

    #[test]
    fn test_diversified_construction_stays_valid() {
        let g = uniform_grid(9, 9, 3);
        for seed in 0..5 {
            let mut ctx = ctx(seed);
            let mut cells: Vec<usize> = (0..g.nland).collect();
            for i in 0..3 {
                let j = ctx.rng.random_range(i..cells.len());
                cells.swap(i, j);
            }
            let seeds = [cells[0], cells[1], cells[2]];
            let mut sol = Solution::new(&g);
            let mut cons = Constructive::new();
            let cfg = BuildConfig::default().with_batch_size(3).with_greedy_alpha(2.5);
            cons.construct_from_seeds(&mut sol, &seeds, true, &g, &cfg, &mut ctx)
                .unwrap();
            assert_eq!(sol.num_assigned(), g.nland);
            sol.validate(&g).unwrap();
        }
    }

    #[test]
    fn test_completes_a_partial_assignment() {
        let g = uniform_grid(4, 4, 2);
        let mut sol = Solution::new(&g);
        let mut half = vec![crate::grid::NO_LOT; g.nland];
        for c in 0..4 {
            half[c] = 0;
        }
        half[12] = 1;
        sol.populate(&half, &g);
        let mut cons = Constructive::new();
        let mut ctx = ctx(3);
        cons.construct(&mut sol, false, &g, &BuildConfig::default(), &mut ctx)
            .unwrap();
        assert_eq!(sol.num_assigned(), 16);
        sol.validate(&g).unwrap();
    }

    #[test]
    fn test_expired_budget_aborts_construction() {
        let g = uniform_grid(6, 6, 2);
        let mut sol = Solution::new(&g);
        let mut cons = Constructive::new();
        let mut ctx =
            SearchContext::new(Some(1), Some(std::time::Duration::ZERO));
        let seeds = [g.index_at(0, 0).unwrap(), g.index_at(5, 5).unwrap()];
        let out = cons.construct_from_seeds(
            &mut sol,
            &seeds,
            false,
            &g,
            &BuildConfig::default(),
            &mut ctx,
        );
        assert_eq!(out, Err(TimedOut));
        assert!(sol.num_assigned() < g.nland);
    }

    #[test]
    fn test_candidate_ordering_prefers_fairness() {
        let mut a = Candidate::new(0, 5);
        let mut b = Candidate::new(1, 6);
        a.projected_excess = 1;
        b.projected_excess = 3;
        a.stamp = 0;
        b.stamp = 0;
        let g = uniform_grid(2, 4, 2);
        let sol = Solution::new(&g);
        assert_eq!(cmp_candidates(&a, &b, &sol), Ordering::Less);
        // Equal deltas fall back to the cell index.
        b.projected_excess = 1;
        assert_eq!(cmp_candidates(&a, &b, &sol), Ordering::Less);
    }
}
