//! Seed layouts and Voronoi-style starting partitions.
//!
//! Initial positions for the constructive heuristic are produced in two
//! steps: reservoir-sample random seeds within each land component
//! (honoring its lot quota), then refine them with one k-means step —
//! assign cells to seeds by weighted shortest path, move each seed to
//! its region's centroid, and snap the centroid to the nearest free
//! land cell.

use crate::context::{sample_items, SearchContext};
use crate::grid::{CellKind, Grid, NO_LOT};
use crate::solution::Solution;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// Multi-source weighted shortest-path assignment from seed cells.
///
/// The edge cost from a cell to a neighbor is the neighbor's static
/// value, and each seed starts at a distance equal to its own value, so
/// expansion is slower through valuable terrain. The first expansion to
/// reach a cell wins; ties break by insertion order.
pub fn voronoi_partition(grid: &Grid, seeds: &[usize]) -> Vec<usize> {
    assert_eq!(seeds.len(), grid.lots);
    let mut assigned = vec![NO_LOT; grid.nland];
    let mut dist = vec![-1i64; grid.nland];
    // (distance, insertion order, cell, lot); lazily deleted stale
    // entries stand in for a decrease-key operation.
    let mut heap: BinaryHeap<Reverse<(i64, u64, usize, usize)>> = BinaryHeap::new();
    let mut seq = 0u64;

    for (lot, &cell) in seeds.iter().enumerate() {
        dist[cell] = grid.values[cell];
        heap.push(Reverse((dist[cell], seq, cell, lot)));
        seq += 1;
    }

    while let Some(Reverse((d, _, cell, lot))) = heap.pop() {
        if dist[cell] != d || assigned[cell] != NO_LOT {
            continue;
        }
        assigned[cell] = lot;
        for &nb in &grid.neighbors[cell] {
            let cd = d + grid.values[nb];
            if dist[nb] == -1 || dist[nb] > cd {
                dist[nb] = cd;
                heap.push(Reverse((cd, seq, nb, lot)));
                seq += 1;
            }
        }
    }
    assigned
}

/// Reservoir-samples random seed cells, one quota per land component.
pub fn random_seeds(grid: &Grid, ctx: &mut SearchContext) -> Vec<usize> {
    let mut seeds = Vec::with_capacity(grid.lots);
    for (cells, &quota) in grid.components.iter().zip(&grid.component_lots) {
        seeds.extend(sample_items(cells, quota, &mut ctx.rng));
    }
    debug_assert_eq!(seeds.len(), grid.lots);
    seeds
}

/// One k-means refinement step over a seed layout.
///
/// Cells are assigned to seeds by [`voronoi_partition`]; each seed then
/// moves to the integer centroid of its region. A centroid that falls
/// on non-land terrain or on an already-taken cell is replaced by the
/// nearest free land cell (breadth-first over the raster).
pub fn kmeans_step(grid: &Grid, seeds: &[usize]) -> Vec<usize> {
    let assigned = voronoi_partition(grid, seeds);
    let mut count = vec![0f64; grid.lots];
    let mut row_sum = vec![0f64; grid.lots];
    let mut col_sum = vec![0f64; grid.lots];
    for (cell, &lot) in assigned.iter().enumerate() {
        if lot == NO_LOT {
            continue;
        }
        let (r, c) = grid.cell_rc[cell];
        count[lot] += 1.0;
        row_sum[lot] += r as f64;
        col_sum[lot] += c as f64;
    }

    let mut taken = vec![false; grid.rows * grid.cols];
    let mut refined = Vec::with_capacity(grid.lots);
    for lot in 0..grid.lots {
        let mut r = (row_sum[lot] / count[lot]).round() as usize;
        let mut c = (col_sum[lot] / count[lot]).round() as usize;
        if grid.kind[r * grid.cols + c] != CellKind::Land || taken[r * grid.cols + c] {
            let (nr, nc) = nearest_free_land(grid, &taken, r, c);
            r = nr;
            c = nc;
        }
        taken[r * grid.cols + c] = true;
        refined.push(grid.index_at(r, c).expect("centroid snapped to land"));
    }
    refined
}

/// Random seeds followed by one k-means step.
pub fn generate_seeds(grid: &Grid, ctx: &mut SearchContext) -> Vec<usize> {
    kmeans_step(grid, &random_seeds(grid, ctx))
}

/// Nearest untaken land cell by BFS over the raster (orthogonal steps).
fn nearest_free_land(grid: &Grid, taken: &[bool], r: usize, c: usize) -> (usize, usize) {
    let mut visited = vec![false; grid.rows * grid.cols];
    let mut queue = VecDeque::new();
    visited[r * grid.cols + c] = true;
    queue.push_back((r, c));
    while let Some((r, c)) = queue.pop_front() {
        let i = r * grid.cols + c;
        if grid.kind[i] == CellKind::Land && !taken[i] {
            return (r, c);
        }
        for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let (nr, nc) = (r as i64 + dr, c as i64 + dc);
            if nr < 0 || nr >= grid.rows as i64 || nc < 0 || nc >= grid.cols as i64 {
                continue;
            }
            let ni = nr as usize * grid.cols + nc as usize;
            if !visited[ni] {
                visited[ni] = true;
                queue.push_back((nr as usize, nc as usize));
            }
        }
    }
    unreachable!("grid holds at least `lots` land cells")
}

/// Baseline partition: uniform random seeds grown by plain breadth-first
/// flood fill, ignoring all quality measures.
pub fn naive_partition(grid: &Grid, ctx: &mut SearchContext) -> Solution {
    let mut assigned = vec![NO_LOT; grid.nland];
    let mut queue = VecDeque::new();
    for lot in 0..grid.lots {
        loop {
            let cell = ctx.rng.random_range(0..grid.nland);
            if assigned[cell] == NO_LOT {
                assigned[cell] = lot;
                queue.push_back(cell);
                break;
            }
        }
    }
    while let Some(cell) = queue.pop_front() {
        for &nb in &grid.neighbors[cell] {
            if assigned[nb] == NO_LOT {
                assigned[nb] = assigned[cell];
                queue.push_back(nb);
            }
        }
    }
    let mut sol = Solution::new(grid);
    sol.populate(&assigned, grid);
    sol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridOptions;

    fn uniform_grid(rows: usize, cols: usize, lots: usize) -> Grid {
        let mut text = format!("{rows} {cols} {lots} 1 0\n");
        for _ in 0..rows * cols {
            text.push_str("1 ");
        }
        Grid::parse_str(&text, &GridOptions::default()).unwrap()
    }

    #[test]
    fn test_voronoi_covers_every_cell() {
        let g = uniform_grid(6, 6, 3);
        let seeds = [0, 17, 35];
        let assigned = voronoi_partition(&g, &seeds);
        assert!(assigned.iter().all(|&l| l != NO_LOT));
        for (lot, &seed) in seeds.iter().enumerate() {
            assert_eq!(assigned[seed], lot, "seed must keep its own cell");
        }
    }

    #[test]
    fn test_voronoi_prefers_cheap_terrain() {
        // Values: a wall of expensive cells splits two seeds; the cheap
        // side belongs entirely to the near seed.
        let text = "1 5 2 1 0\n1 1 9 1 1\n";
        let g = Grid::parse_str(text, &GridOptions::default()).unwrap();
        let assigned = voronoi_partition(&g, &[0, 4]);
        assert_eq!(assigned[1], 0);
        assert_eq!(assigned[3], 1);
    }

    #[test]
    fn test_voronoi_tie_breaks_by_insertion_order() {
        let g = uniform_grid(1, 3, 2);
        // Both seeds reach the middle cell at equal distance; the
        // earlier-inserted seed wins.
        let assigned = voronoi_partition(&g, &[0, 2]);
        assert_eq!(assigned[1], 0);
    }

    #[test]
    fn test_random_seeds_distinct_and_per_component() {
        let g = uniform_grid(5, 5, 4);
        let mut ctx = SearchContext::new(Some(5), None);
        for _ in 0..50 {
            let mut seeds = random_seeds(&g, &mut ctx);
            assert_eq!(seeds.len(), 4);
            seeds.sort_unstable();
            seeds.dedup();
            assert_eq!(seeds.len(), 4, "seeds must be distinct");
        }
    }

    #[test]
    fn test_generate_seeds_lie_on_land() {
        let text = "3 4 2 1 25\n\
                    -1 2 3 4\n\
                    -1 5 6 7\n\
                    -1 8 9 1\n";
        let g = Grid::parse_str(text, &GridOptions::default()).unwrap();
        let mut ctx = SearchContext::new(Some(9), None);
        for _ in 0..20 {
            let seeds = generate_seeds(&g, &mut ctx);
            assert_eq!(seeds.len(), 2);
            assert_ne!(seeds[0], seeds[1]);
            assert!(seeds.iter().all(|&s| s < g.nland));
        }
    }

    #[test]
    fn test_kmeans_step_centers_seeds() {
        let g = uniform_grid(5, 5, 1);
        // A single corner seed owns everything; the centroid is the
        // middle of the raster.
        let refined = kmeans_step(&g, &[0]);
        assert_eq!(refined, vec![g.index_at(2, 2).unwrap()]);
    }

    #[test]
    fn test_naive_partition_is_complete() {
        let g = uniform_grid(7, 7, 3);
        let mut ctx = SearchContext::new(Some(13), None);
        let sol = naive_partition(&g, &mut ctx);
        assert_eq!(sol.num_assigned(), g.nland);
        assert!(sol.area().iter().all(|&a| a > 0));
        sol.validate(&g).unwrap();
    }
}
