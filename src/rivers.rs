//! Incremental river-fairness tracking.
//!
//! Fairness demands that a river-adjacent lot be no larger than the
//! smallest river-free lot (the *anchor*). Any area by which a
//! river-adjacent lot exceeds the anchor is a violation whose magnitude
//! accumulates into the tracker's `excess`.
//!
//! The tracker keeps the lots in a permutation sorted by ascending area
//! together with its inverse. A hypothetical single-cell move changes
//! one or two lot areas by one, so the permutation can be repaired by a
//! local shift and the `(anchor, violations, excess)` triple adjusted by
//! reasoning about which lots cross the anchor threshold — including
//! the cases where the anchor itself shrinks, grows, changes identity,
//! or disappears because it gained river adjacency. Batched commits
//! touch many lots at once and rebuild from scratch instead.
//!
//! Every incremental path is checked against the brute-force linear
//! rescan in debug builds.

/// Hypothetical fairness state after a single-cell move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiverDelta {
    /// Total area surplus of river-adjacent lots over the anchor.
    pub excess: i64,
    /// Number of river-adjacent lots larger than the anchor.
    pub violations: i64,
    /// The anchor lot, if any river-free lot exists.
    pub anchor: Option<usize>,
}

/// Order-statistics bookkeeping over lot areas.
#[derive(Debug, Clone)]
pub struct RiverTracker {
    lots: usize,
    /// Lot indices in ascending order of area.
    sorted: Vec<usize>,
    /// Inverse permutation of `sorted`.
    rank: Vec<usize>,
    anchor: Option<usize>,
    violations: i64,
    excess: i64,
}

impl RiverTracker {
    /// Creates a tracker for `lots` lots, all with zero area.
    ///
    /// # Panics
    /// Panics if `lots` is zero.
    pub fn new(lots: usize) -> Self {
        assert!(lots > 0, "river tracker needs at least one lot");
        Self {
            lots,
            sorted: (0..lots).collect(),
            rank: (0..lots).collect(),
            // With every area zero and no river cells counted yet, the
            // first lot in sorted order is the anchor.
            anchor: Some(0),
            violations: 0,
            excess: 0,
        }
    }

    /// Resets to the all-zero-area state.
    pub fn reset(&mut self) {
        for i in 0..self.lots {
            self.sorted[i] = i;
            self.rank[i] = i;
        }
        self.anchor = Some(0);
        self.violations = 0;
        self.excess = 0;
    }

    /// Total area surplus of river-adjacent lots over the anchor.
    pub fn excess(&self) -> i64 {
        self.excess
    }

    /// Number of river-adjacent lots larger than the anchor.
    pub fn violations(&self) -> i64 {
        self.violations
    }

    /// The smallest river-free lot, if one exists.
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Lot indices in ascending order of area.
    pub fn sorted(&self) -> &[usize] {
        &self.sorted
    }

    /// The lot with the smallest area.
    pub fn smallest_lot(&self) -> usize {
        self.sorted[0]
    }

    /// The lot with the largest area.
    pub fn largest_lot(&self) -> usize {
        self.sorted[self.lots - 1]
    }

    /// Rebuilds the permutation and fairness state from scratch.
    ///
    /// O(lots log lots). Used after any operation that perturbs many
    /// lots at once.
    pub fn rebuild(&mut self, area: &[i64], num_river: &[i64]) {
        self.sorted.sort_by_key(|&l| (area[l], l));
        for (r, &l) in self.sorted.iter().enumerate() {
            self.rank[l] = r;
        }
        let state = self.brute_force(area, num_river);
        self.anchor = state.anchor;
        self.violations = state.violations;
        self.excess = state.excess;
    }

    /// Commits a batch of assignments by rebuilding.
    ///
    /// Batched moves touch multiple lots simultaneously; the local-shift
    /// update does not compose across them cheaply.
    pub fn commit_batch(&mut self, batch_len: usize, area: &[i64], num_river: &[i64]) {
        if batch_len > 0 {
            self.rebuild(area, num_river);
        }
    }

    /// Fairness state recomputed by linear rescan, using the current
    /// sorted order to locate the anchor.
    pub fn brute_force(&self, area: &[i64], num_river: &[i64]) -> RiverDelta {
        let anchor = self.sorted.iter().copied().find(|&l| num_river[l] == 0);
        let Some(a) = anchor else {
            return RiverDelta {
                excess: 0,
                violations: 0,
                anchor: None,
            };
        };
        let mut excess = 0;
        let mut violations = 0;
        for l in 0..self.lots {
            if num_river[l] > 0 && area[l] > area[a] {
                excess += area[l] - area[a];
                violations += 1;
            }
        }
        RiverDelta {
            excess,
            violations,
            anchor,
        }
    }

    /// Evaluates moving one cell out of `from` and/or into `to`.
    ///
    /// The move is applied to `area`, `num_river`, and the sorted
    /// permutation temporarily and fully restored before returning, so
    /// the call is observably pure. `cell_on_river` is the river
    /// adjacency of the moved cell.
    pub fn evaluate_move(
        &mut self,
        from: Option<usize>,
        to: Option<usize>,
        cell_on_river: bool,
        area: &mut [i64],
        num_river: &mut [i64],
    ) -> RiverDelta {
        let x = self.anchor;
        let mut nx = self.anchor;
        let mut vio = self.violations;
        let mut excess = self.excess;
        let mut undo_from = None;
        let mut undo_to = None;

        if let Some(from) = from {
            let i = self.rank[from];

            // Walk down to the start of from's equal-area run. When the
            // anchor itself shrinks, every river lot in the run becomes
            // a violator.
            let mut run_start = i;
            while run_start > 0 && area[self.sorted[run_start - 1]] >= area[from] {
                run_start -= 1;
                if x == Some(from) && num_river[self.sorted[run_start]] > 0 {
                    vio += 1;
                }
            }
            if x == Some(from) {
                let mut j = i + 1;
                while j < self.lots && area[self.sorted[j]] <= area[from] {
                    if num_river[self.sorted[j]] > 0 {
                        vio += 1;
                    }
                    j += 1;
                }
            }

            self.sorted.swap(i, run_start);
            self.rank[self.sorted[i]] = i;
            self.rank[self.sorted[run_start]] = run_start;
            if cell_on_river {
                debug_assert!(num_river[from] > 0);
                num_river[from] -= 1;
            }
            area[from] -= 1;
            undo_from = Some((i, run_start));

            if num_river[from] == 0 {
                if nx.is_none() || area[from] < area[nx.unwrap()] {
                    nx = Some(from);
                }
                if nx != x {
                    // `from` took over as the anchor. Re-measure the old
                    // violators against the lower baseline and pick up
                    // the river lots between the two anchor areas.
                    let ax = match x {
                        Some(xl) => area[xl],
                        None => i64::MAX,
                    };
                    if let Some(xl) = x {
                        if area[from] + 1 > area[xl] {
                            vio -= 1;
                            excess -= area[from] + 1 - area[xl];
                        }
                        excess += (ax - area[from]) * vio;
                    }
                    let mut j = self.rank[from] + 1;
                    while j < self.lots {
                        let l = self.sorted[j];
                        if area[l] > ax {
                            break;
                        }
                        if num_river[l] > 0 && area[l] > area[from] {
                            excess += area[l] - area[from];
                            vio += 1;
                        }
                        j += 1;
                    }
                } else if cell_on_river && x.is_some() {
                    // `from` lost its last river cell but stays above the
                    // anchor: it simply stops violating.
                    excess -= area[from] + 1 - area[x.unwrap()];
                    vio -= 1;
                } else if x == Some(from) {
                    // The anchor shrank by one; every surplus grows.
                    excess += vio;
                }
            } else if let Some(a) = nx {
                if area[from] >= area[a] {
                    excess -= 1;
                    if area[from] == area[a] {
                        vio -= 1;
                    }
                }
            }
        }

        if let Some(to) = to {
            let i = self.rank[to];

            // The anchor is about to grow or gain a river cell; hand the
            // role to an equal-area river-free lot if one exists.
            if nx == Some(to) {
                let mut j = i;
                while j > 0 && area[self.sorted[j - 1]] == area[to] {
                    j -= 1;
                    if num_river[self.sorted[j]] == 0 {
                        nx = Some(self.sorted[j]);
                        break;
                    }
                }
            }
            let mut run_end = i;
            while run_end + 1 < self.lots && area[self.sorted[run_end + 1]] <= area[to] {
                run_end += 1;
                if nx == Some(to) && num_river[self.sorted[run_end]] == 0 {
                    nx = Some(self.sorted[run_end]);
                }
            }

            self.sorted.swap(i, run_end);
            self.rank[self.sorted[i]] = i;
            self.rank[self.sorted[run_end]] = run_end;
            if cell_on_river {
                num_river[to] += 1;
            }
            area[to] += 1;
            undo_to = Some((i, run_end));

            match nx {
                Some(a) if a != to && area[a] < area[to] && num_river[to] > 0 => {
                    if num_river[to] == 1 && cell_on_river {
                        // `to` just became river-adjacent: full surplus.
                        excess += area[to] - area[a];
                        vio += 1;
                    } else {
                        excess += 1;
                        if area[to] == area[a] + 1 {
                            vio += 1;
                        }
                    }
                }
                Some(a) if a == to => {
                    if num_river[to] > 0 {
                        // The anchor became river-adjacent and no
                        // equal-area replacement exists: rescan upward
                        // for the new anchor, retiring the violators
                        // whose area it absorbs.
                        nx = None;
                        let mut j = self.rank[to] + 1;
                        while j < self.lots {
                            let l = self.sorted[j];
                            if let Some(na) = nx {
                                if area[l] != area[na] {
                                    break;
                                }
                            }
                            if num_river[l] == 0 {
                                if nx.is_none() {
                                    nx = Some(l);
                                }
                            } else {
                                vio -= 1;
                                excess -= area[l] - (area[to] - 1);
                            }
                            j += 1;
                        }
                        match nx {
                            None => {
                                excess = 0;
                                vio = 0;
                            }
                            Some(na) => {
                                excess -= vio * (area[na] - (area[to] - 1));
                            }
                        }
                    } else {
                        // The anchor grew by one: every surplus shrinks,
                        // and equal-area river lots stop violating.
                        debug_assert!(!cell_on_river);
                        excess -= vio;
                        let mut j = self.rank[a] + 1;
                        while j < self.lots && area[self.sorted[j]] == area[a] {
                            if num_river[self.sorted[j]] > 0 {
                                vio -= 1;
                            }
                            j += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        debug_assert!(nx.is_some() || (excess == 0 && vio == 0));
        #[cfg(debug_assertions)]
        {
            let check = self.brute_force(area, num_river);
            debug_assert_eq!(
                (excess, vio),
                (check.excess, check.violations),
                "incremental fairness drifted from brute force"
            );
        }

        // Restore in reverse order of application.
        if let (Some(to), Some((s3, s4))) = (to, undo_to) {
            area[to] -= 1;
            if cell_on_river {
                num_river[to] -= 1;
            }
            self.sorted.swap(s3, s4);
            self.rank[self.sorted[s3]] = s3;
            self.rank[self.sorted[s4]] = s4;
        }
        if let (Some(from), Some((s1, s2))) = (from, undo_from) {
            area[from] += 1;
            if cell_on_river {
                num_river[from] += 1;
            }
            self.sorted.swap(s1, s2);
            self.rank[self.sorted[s1]] = s1;
            self.rank[self.sorted[s2]] = s2;
        }

        RiverDelta {
            excess,
            violations: vio,
            anchor: nx,
        }
    }

    #[cfg(test)]
    fn assert_invariants(&self, area: &[i64]) {
        for w in self.sorted.windows(2) {
            assert!(area[w[0]] <= area[w[1]], "sorted order violated");
        }
        for (r, &l) in self.sorted.iter().enumerate() {
            assert_eq!(self.rank[l], r, "rank is not the inverse permutation");
        }
    }
}
