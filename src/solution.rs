//! Cell-to-lot assignments and their quality ordering.
//!
//! A [`Solution`] owns the assignment array, the per-lot area and
//! river-cell bookkeeping, and one instance of each incremental tracker.
//! Solutions are created once per population slot and repopulated in
//! place as the search replaces them.

use crate::constructive::Candidate;
use crate::grid::{Grid, NO_LOT};
use crate::objective::ObjectiveTracker;
use crate::rivers::RiverTracker;
use std::cmp::Ordering;

/// Size-ratio differences below this are treated as equal when ordering
/// solutions.
pub const EPS: f64 = 1e-3;

/// An assignment of land cells to lots with incremental quality state.
#[derive(Debug, Clone)]
pub struct Solution {
    pub(crate) assigned: Vec<usize>,
    pub(crate) area: Vec<i64>,
    pub(crate) num_river: Vec<i64>,
    pub(crate) num_assigned: usize,
    pub(crate) objective: ObjectiveTracker,
    pub(crate) rivers: RiverTracker,
}

impl Solution {
    /// Creates an empty solution sized for `grid`.
    pub fn new(grid: &Grid) -> Self {
        Self {
            assigned: vec![NO_LOT; grid.nland],
            area: vec![0; grid.lots],
            num_river: vec![0; grid.lots],
            num_assigned: 0,
            objective: ObjectiveTracker::new(grid.lots),
            rivers: RiverTracker::new(grid.lots),
        }
    }

    /// Clears the assignment and both trackers.
    pub fn reset(&mut self) {
        self.assigned.fill(NO_LOT);
        self.area.fill(0);
        self.num_river.fill(0);
        self.num_assigned = 0;
        self.objective.reset();
        self.rivers.reset();
    }

    /// Per-cell lot labels ([`NO_LOT`] where unassigned).
    pub fn assigned(&self) -> &[usize] {
        &self.assigned
    }

    /// The lot a cell is assigned to, if any.
    pub fn lot_of(&self, cell: usize) -> Option<usize> {
        let lot = self.assigned[cell];
        (lot != NO_LOT).then_some(lot)
    }

    /// Whether a cell is assigned.
    pub fn is_assigned(&self, cell: usize) -> bool {
        self.assigned[cell] != NO_LOT
    }

    /// Cell count of each lot.
    pub fn area(&self) -> &[i64] {
        &self.area
    }

    /// Number of assigned cells.
    pub fn num_assigned(&self) -> usize {
        self.num_assigned
    }

    /// Objective value: variance-like spread of per-lot aggregate value.
    pub fn value(&self) -> i64 {
        self.objective.value()
    }

    /// Total river-fairness excess.
    pub fn river_excess(&self) -> i64 {
        self.rivers.excess()
    }

    /// Number of river-fairness violations.
    pub fn river_violations(&self) -> i64 {
        self.rivers.violations()
    }

    /// The lot with the smallest area.
    pub fn small_lot(&self) -> usize {
        self.rivers.smallest_lot()
    }

    /// The lot with the largest area.
    pub fn big_lot(&self) -> usize {
        self.rivers.largest_lot()
    }

    /// Largest-to-smallest lot area ratio, thresholded: within
    /// `max_size_ratio` there is no penalty and 0 is returned. An empty
    /// smallest lot yields a huge sentinel.
    pub fn size_ratio(&self, max_size_ratio: i64) -> f64 {
        let small = self.area[self.small_lot()];
        if small == 0 {
            return (1i64 << 28) as f64;
        }
        let sr = self.area[self.big_lot()] as f64 / small as f64;
        if sr > max_size_ratio as f64 {
            sr
        } else {
            0.0
        }
    }

    /// Unthresholded largest-to-smallest area ratio (0 when the
    /// smallest lot is empty). Used for reporting.
    pub fn raw_size_ratio(&self) -> f64 {
        let small = self.area[self.small_lot()];
        if small == 0 {
            0.0
        } else {
            self.area[self.big_lot()] as f64 / small as f64
        }
    }

    /// Installs a full (possibly partial) assignment and rebuilds all
    /// bookkeeping from scratch. O(nland + lots log lots).
    pub fn populate(&mut self, assigned: &[usize], grid: &Grid) {
        assert_eq!(assigned.len(), grid.nland);
        self.reset();
        self.assigned.copy_from_slice(assigned);
        for (cell, &lot) in self.assigned.iter().enumerate() {
            if lot == NO_LOT {
                continue;
            }
            self.num_assigned += 1;
            self.area[lot] += 1;
            if grid.river_adjacent[cell] {
                self.num_river[lot] += 1;
            }
        }
        self.rivers.rebuild(&self.area, &self.num_river);
        self.objective.rebuild(&self.assigned, &grid.values);
    }

    /// Commits a batch of candidate assignments.
    ///
    /// First writer wins: a candidate targeting an already-assigned cell
    /// is dropped (and marked so). Returns the number of cells actually
    /// assigned.
    pub fn apply_batch(&mut self, cands: &mut [Candidate], grid: &Grid) -> usize {
        let mut done = 0;
        for c in cands.iter_mut() {
            if c.is_dropped() {
                continue;
            }
            if self.assigned[c.cell] != NO_LOT {
                c.invalidate();
                continue;
            }
            self.assigned[c.cell] = c.lot;
            self.num_assigned += 1;
            self.area[c.lot] += 1;
            if grid.river_adjacent[c.cell] {
                self.num_river[c.lot] += 1;
            }
            done += 1;
        }
        self.rivers
            .commit_batch(cands.len(), &self.area, &self.num_river);
        let values = &grid.values;
        self.objective.commit_batch(
            cands.len(),
            cands
                .iter()
                .filter(|c| !c.is_dropped())
                .map(|c| (c.lot, values[c.cell])),
        );
        done
    }

    /// Recomputes a candidate's projected deltas if its generation stamp
    /// is stale relative to this solution's mutation counter.
    pub(crate) fn refresh_candidate(
        &mut self,
        cand: &mut Candidate,
        grid: &Grid,
        max_size_ratio: i64,
    ) {
        if cand.stamp == self.num_assigned {
            return;
        }
        let od = self
            .objective
            .evaluate_move(None, Some(cand.lot), grid.values[cand.cell]);
        let rd = self.rivers.evaluate_move(
            None,
            Some(cand.lot),
            grid.river_adjacent[cand.cell],
            &mut self.area,
            &mut self.num_river,
        );
        cand.projected_value = od.value;
        cand.projected_excess = rd.excess;
        cand.projected_ratio = self.candidate_size_ratio(cand.lot, max_size_ratio);
        cand.stamp = self.num_assigned;
    }

    /// Thresholded size ratio (×1000, integer) after hypothetically
    /// growing `lot` by one cell.
    fn candidate_size_ratio(&self, lot: usize, max_size_ratio: i64) -> i64 {
        let lots = self.area.len();
        let big = self.area[self.big_lot()];
        let ba = if self.area[lot] == big {
            self.area[lot] + 1
        } else {
            big
        };
        let small = self.small_lot();
        let mut sa = self.area[small];
        if lot == small && lots > 1 && self.area[self.rivers.sorted()[1]] > self.area[lot] {
            sa += 1;
        }
        if sa == 0 {
            return i64::MAX;
        }
        let sr = (ba * 1000) / sa;
        if sr > 1000 * max_size_ratio {
            sr
        } else {
            0
        }
    }

    /// Whether the cell has a neighbor with a different assignment.
    pub fn is_border_cell(&self, cell: usize, grid: &Grid) -> bool {
        grid.neighbors[cell]
            .iter()
            .any(|&nb| self.assigned[nb] != self.assigned[cell])
    }

    /// Lexicographic quality ordering: smaller `(river excess,
    /// size ratio, objective value)` is better, with size-ratio
    /// differences below [`EPS`] falling through to the objective.
    pub fn cmp_quality(&self, other: &Self, max_size_ratio: i64) -> Ordering {
        match self.river_excess().cmp(&other.river_excess()) {
            Ordering::Equal => {
                let sr = self.size_ratio(max_size_ratio) - other.size_ratio(max_size_ratio);
                if sr.abs() < EPS {
                    self.value().cmp(&other.value())
                } else if sr < 0.0 {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            ord => ord,
        }
    }

    /// Full consistency audit: bookkeeping matches the assignment, every
    /// lot of a complete solution is a nonempty single connected
    /// component, and both trackers agree with brute force.
    ///
    /// Intended for tests and debug assertions.
    pub fn validate(&self, grid: &Grid) -> Result<(), String> {
        let lots = grid.lots;
        let mut area = vec![0i64; lots];
        let mut num_river = vec![0i64; lots];
        let mut any_cell = vec![NO_LOT; lots];
        let mut num_assigned = 0usize;
        for cell in 0..grid.nland {
            let lot = self.assigned[cell];
            if lot == NO_LOT {
                continue;
            }
            if lot >= lots {
                return Err(format!("cell {cell} assigned to invalid lot {lot}"));
            }
            num_assigned += 1;
            area[lot] += 1;
            if grid.river_adjacent[cell] {
                num_river[lot] += 1;
            }
            any_cell[lot] = cell;
        }
        if num_assigned != self.num_assigned {
            return Err(format!(
                "num_assigned {} but {} cells are assigned",
                self.num_assigned, num_assigned
            ));
        }
        for lot in 0..lots {
            if area[lot] != self.area[lot] {
                return Err(format!(
                    "lot {lot}: recorded area {} but {} cells assigned",
                    self.area[lot], area[lot]
                ));
            }
            if num_river[lot] != self.num_river[lot] {
                return Err(format!(
                    "lot {lot}: recorded {} river cells but counted {}",
                    self.num_river[lot], num_river[lot]
                ));
            }
        }
        if num_assigned == grid.nland {
            if let Some(lot) = (0..lots).find(|&l| area[l] == 0) {
                return Err(format!("complete solution has empty lot {lot}"));
            }
        }

        // Each nonempty lot must be one connected component.
        let mut visited = vec![false; grid.nland];
        let mut queue = std::collections::VecDeque::new();
        for lot in 0..lots {
            if any_cell[lot] == NO_LOT {
                continue;
            }
            let mut reached = 0i64;
            visited[any_cell[lot]] = true;
            queue.push_back(any_cell[lot]);
            while let Some(c) = queue.pop_front() {
                reached += 1;
                for &nb in &grid.neighbors[c] {
                    if self.assigned[nb] == lot && !visited[nb] {
                        visited[nb] = true;
                        queue.push_back(nb);
                    }
                }
            }
            if reached != area[lot] {
                return Err(format!(
                    "lot {lot} is disconnected: reached {reached} of {} cells",
                    area[lot]
                ));
            }
        }

        if (self.objective.value() - self.objective.brute_force_value()).abs() >= 2 {
            return Err(format!(
                "objective {} drifted from brute force {}",
                self.objective.value(),
                self.objective.brute_force_value()
            ));
        }
        let rd = self.rivers.brute_force(&self.area, &self.num_river);
        if rd.excess != self.rivers.excess() || rd.violations != self.rivers.violations() {
            return Err(format!(
                "river fairness ({}, {}) drifted from brute force ({}, {})",
                self.rivers.excess(),
                self.rivers.violations(),
                rd.excess,
                rd.violations
            ));
        }
        Ok(())
    }
}
