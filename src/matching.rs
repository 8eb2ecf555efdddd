//! Minimum-cost perfect matching on a square cost matrix.
//!
//! Hungarian algorithm with potentials, O(n³). Crossover uses it to
//! pair lots across two parents by maximum cell overlap (costs are
//! negated overlap counts).

/// A perfect matching between rows and columns of a cost matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matching {
    /// Column matched to each row.
    pub row_mate: Vec<usize>,
    /// Row matched to each column.
    pub col_mate: Vec<usize>,
    /// Total cost of the matching.
    pub total: i64,
}

/// Solves minimum-cost perfect matching over `cost` (square, n ≥ 1).
pub fn min_cost_matching(cost: &[Vec<i64>]) -> Matching {
    let n = cost.len();
    debug_assert!(n > 0 && cost.iter().all(|row| row.len() == n));

    // Reduce rows and columns so some zero-cost edges appear.
    let mut u = vec![0i64; n];
    let mut v = vec![0i64; n];
    for i in 0..n {
        u[i] = cost[i][0];
        for j in 1..n {
            u[i] = u[i].min(cost[i][j]);
        }
    }
    for j in 0..n {
        v[j] = cost[0][j] - u[0];
        for i in 1..n {
            v[j] = v[j].min(cost[i][j] - u[i]);
        }
    }

    // Greedy initial matching on tight edges.
    const NONE: usize = usize::MAX;
    let mut row_mate = vec![NONE; n];
    let mut col_mate = vec![NONE; n];
    let mut mated = 0;
    for i in 0..n {
        for j in 0..n {
            if col_mate[j] != NONE {
                continue;
            }
            if cost[i][j] == u[i] + v[j] {
                row_mate[i] = j;
                col_mate[j] = i;
                mated += 1;
                break;
            }
        }
    }

    let mut dist = vec![0i64; n];
    let mut dad = vec![NONE; n];
    let mut seen = vec![false; n];

    // Repeatedly find an augmenting path from a free row.
    while mated < n {
        let mut s = 0;
        while row_mate[s] != NONE {
            s += 1;
        }
        dad.fill(NONE);
        seen.fill(false);
        for k in 0..n {
            dist[k] = cost[s][k] - u[s] - v[k];
        }

        let mut j;
        loop {
            j = NONE;
            for k in 0..n {
                if seen[k] {
                    continue;
                }
                if j == NONE || dist[k] < dist[j] {
                    j = k;
                }
            }
            seen[j] = true;
            if col_mate[j] == NONE {
                break;
            }
            let i = col_mate[j];
            for k in 0..n {
                if seen[k] {
                    continue;
                }
                let new_dist = dist[j] + cost[i][k] - u[i] - v[k];
                if dist[k] > new_dist {
                    dist[k] = new_dist;
                    dad[k] = j;
                }
            }
        }

        // Update potentials along the alternating tree.
        for k in 0..n {
            if k == j || !seen[k] {
                continue;
            }
            let i = col_mate[k];
            v[k] += dist[k] - dist[j];
            u[i] -= dist[k] - dist[j];
        }
        u[s] += dist[j];

        // Flip the augmenting path.
        while dad[j] != NONE {
            let d = dad[j];
            col_mate[j] = col_mate[d];
            row_mate[col_mate[j]] = j;
            j = d;
        }
        col_mate[j] = s;
        row_mate[s] = j;
        mated += 1;
    }

    let total = (0..n).map(|i| cost[i][row_mate[i]]).sum();
    Matching {
        row_mate,
        col_mate,
        total,
    }
}
