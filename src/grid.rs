//! Immutable instance model.
//!
//! A [`Grid`] is built once from an instance file and shared read-only
//! by every solution: per-cell static values, river adjacency, boundary
//! flags, and the land-only adjacency lists. Loading also distributes
//! the requested lot count over the connected components of land and
//! reclassifies components too small to receive a lot.
//!
//! # Instance format
//!
//! A header line `rows cols lots apt_classes river_pct` followed by
//! `rows × cols` whitespace-separated integers: `-1` marks a river
//! cell, `0` (or `-2`) a preserved cell, and any positive value the
//! static value of a land cell.

use std::path::{Path, PathBuf};

/// Sentinel for "cell not assigned to any lot".
pub const NO_LOT: usize = usize::MAX;

/// Error loading or parsing an instance or solution file.
///
/// Parsing fails fast: no partial grid state is retained.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing or malformed header (expected `rows cols lots apt_classes river_pct`)")]
    Header,

    #[error("malformed integer {token:?} (token #{position})")]
    Token { token: String, position: usize },

    #[error("truncated input: expected {expected} cells, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("invalid cell value {value} at row {row}, column {col}")]
    CellValue { row: usize, col: usize, value: i64 },

    #[error("lot count must be between 1 and the number of land cells, got {lots}")]
    LotCount { lots: i64 },

    #[error("{lots} lots cannot be distributed over the {components} land component(s)")]
    Infeasible { lots: usize, components: usize },

    #[error("solution file names {found} lots but the grid has {lots}")]
    TooManyLots { found: usize, lots: usize },
}

/// Raster cell classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Allocatable land with a positive static value.
    Land,
    /// River; land next to it is flagged river-adjacent.
    River,
    /// Preserved terrain, never allocated.
    Preserved,
}

/// Cell adjacency scheme of the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Neighborhood {
    /// Orthogonal neighbors only.
    #[default]
    Four,
    /// Orthogonal plus diagonal neighbors.
    Eight,
}

impl Neighborhood {
    fn offsets(self) -> &'static [(i64, i64)] {
        const OFFSETS: [(i64, i64); 8] = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (-1, 1),
            (1, -1),
            (1, 1),
        ];
        match self {
            Neighborhood::Four => &OFFSETS[..4],
            Neighborhood::Eight => &OFFSETS,
        }
    }
}

/// Options controlling instance loading.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridOptions {
    /// Overrides the lot count from the instance header.
    pub lots: Option<usize>,

    /// Adjacency scheme used for components, lot regions, and the
    /// river/boundary flags.
    pub neighborhood: Neighborhood,
}

impl GridOptions {
    /// Overrides the lot count from the instance header.
    pub fn with_lots(mut self, lots: usize) -> Self {
        self.lots = Some(lots);
        self
    }

    /// Sets the adjacency scheme.
    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }
}

/// The immutable land raster and its derived adjacency structure.
///
/// Land cells are indexed `0..nland` in row-major raster order; all
/// per-cell vectors below are indexed by that land index.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Raster height.
    pub rows: usize,
    /// Raster width.
    pub cols: usize,
    /// Number of lots to allocate.
    pub lots: usize,
    /// Number of aptitude classes reported by the instance header.
    pub apt_classes: usize,
    /// River percentage reported by the instance header.
    pub river_pct: i64,
    /// Number of allocatable land cells.
    pub nland: usize,
    /// Number of river cells in the raster.
    pub nriver: usize,
    /// Classification of every raster cell, row-major.
    pub kind: Vec<CellKind>,
    /// Static value of each land cell (positive).
    pub values: Vec<i64>,
    /// Whether each land cell touches a river cell.
    pub river_adjacent: Vec<bool>,
    /// Whether each land cell touches preserved terrain or the raster edge.
    pub border: Vec<bool>,
    /// Land-to-land adjacency lists (symmetric).
    pub neighbors: Vec<Vec<usize>>,
    /// Raster coordinates of each land cell.
    pub cell_rc: Vec<(usize, usize)>,
    /// Land cells of each surviving connected component.
    pub components: Vec<Vec<usize>>,
    /// Lots allotted to each surviving component (sums to `lots`).
    pub component_lots: Vec<usize>,
    index_of: Vec<usize>,
    neighborhood: Neighborhood,
}

impl Grid {
    /// Loads an instance from a file.
    pub fn load(path: impl AsRef<Path>, opts: &GridOptions) -> Result<Self, GridError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&text, opts)
    }

    /// Parses an instance from text.
    pub fn parse_str(input: &str, opts: &GridOptions) -> Result<Self, GridError> {
        let mut tokens = Tokens::new(input);
        let rows = tokens.next_int()?;
        let cols = tokens.next_int()?;
        let header_lots = tokens.next_int()?;
        let apt_classes = tokens.next_int()?;
        let river_pct = tokens.next_int()?;
        if rows <= 0 || cols <= 0 || apt_classes < 0 {
            return Err(GridError::Header);
        }
        let (rows, cols) = (rows as usize, cols as usize);

        // Classify the raster.
        let mut kind = Vec::with_capacity(rows * cols);
        let mut raw = Vec::with_capacity(rows * cols);
        let mut nriver = 0usize;
        for i in 0..rows * cols {
            let x = match tokens.next_int() {
                Ok(x) => x,
                Err(GridError::Truncated { .. }) => {
                    return Err(GridError::Truncated {
                        expected: rows * cols,
                        found: i,
                    })
                }
                Err(e) => return Err(e),
            };
            let (r, c) = (i / cols, i % cols);
            kind.push(match x {
                -1 => {
                    nriver += 1;
                    CellKind::River
                }
                0 | -2 => CellKind::Preserved,
                v if v > 0 => CellKind::Land,
                v => return Err(GridError::CellValue { row: r, col: c, value: v }),
            });
            raw.push(x);
        }

        let nland_initial = kind.iter().filter(|&&k| k == CellKind::Land).count();
        let lots = match opts.lots {
            Some(l) => l as i64,
            None => header_lots,
        };
        if lots < 1 || lots as usize > nland_initial.max(1) {
            return Err(GridError::LotCount { lots });
        }
        let lots = lots as usize;

        // Connected components of land, before reclassification.
        let offsets = opts.neighborhood.offsets();
        let raw_components = land_components(rows, cols, &kind, offsets);

        // Distribute lots proportionally to component size; components
        // receiving no lot are reclassified as preserved terrain.
        let mut component_lots: Vec<usize> = raw_components
            .iter()
            .map(|cc| (cc.len() as f64 * lots as f64 / nland_initial as f64) as usize)
            .collect();
        for (cc, &n) in raw_components.iter().zip(&component_lots) {
            if n == 0 {
                for &i in cc {
                    kind[i] = CellKind::Preserved;
                }
            }
        }
        let mut sum: usize = component_lots.iter().sum();
        if sum < lots {
            if let Some(n) = component_lots.iter_mut().find(|n| **n > 1) {
                *n += lots - sum;
                sum = lots;
            }
        }
        if sum != lots {
            return Err(GridError::Infeasible {
                lots,
                components: raw_components.len(),
            });
        }
        log::info!(
            "found {} land component(s), {} surviving the lot distribution",
            raw_components.len(),
            component_lots.iter().filter(|&&n| n > 0).count()
        );

        // Index the surviving land cells and derive the per-cell flags.
        let mut index_of = vec![NO_LOT; rows * cols];
        let mut values = Vec::new();
        let mut river_adjacent = Vec::new();
        let mut border = Vec::new();
        let mut cell_rc = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let i = r * cols + c;
                if kind[i] != CellKind::Land {
                    continue;
                }
                let mut next_to_river = false;
                let mut on_border = false;
                for &(dr, dc) in offsets {
                    let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                    if nr < 0 || nr >= rows as i64 || nc < 0 || nc >= cols as i64 {
                        on_border = true;
                        continue;
                    }
                    match kind[nr as usize * cols + nc as usize] {
                        CellKind::River => next_to_river = true,
                        CellKind::Preserved => on_border = true,
                        CellKind::Land => {}
                    }
                }
                index_of[i] = values.len();
                values.push(raw[i]);
                river_adjacent.push(next_to_river);
                border.push(on_border);
                cell_rc.push((r, c));
            }
        }
        let nland = values.len();

        // Land-to-land adjacency.
        let mut neighbors = vec![Vec::new(); nland];
        for (idx, &(r, c)) in cell_rc.iter().enumerate() {
            for &(dr, dc) in offsets {
                let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                if nr < 0 || nr >= rows as i64 || nc < 0 || nc >= cols as i64 {
                    continue;
                }
                let nb = index_of[nr as usize * cols + nc as usize];
                if nb != NO_LOT {
                    neighbors[idx].push(nb);
                }
            }
        }

        // Surviving components, translated to land indices.
        let mut components = Vec::new();
        let mut surviving_lots = Vec::new();
        for (cc, &n) in raw_components.iter().zip(&component_lots) {
            if n == 0 {
                continue;
            }
            components.push(cc.iter().map(|&i| index_of[i]).collect());
            surviving_lots.push(n);
        }

        Ok(Self {
            rows,
            cols,
            lots,
            apt_classes: apt_classes as usize,
            river_pct,
            nland,
            nriver,
            kind,
            values,
            river_adjacent,
            border,
            neighbors,
            cell_rc,
            components,
            component_lots: surviving_lots,
            index_of,
            neighborhood: opts.neighborhood,
        })
    }

    /// Land index of the raster cell at `(r, c)`, if it is land.
    pub fn index_at(&self, r: usize, c: usize) -> Option<usize> {
        let i = self.index_of[r * self.cols + c];
        (i != NO_LOT).then_some(i)
    }

    /// The adjacency scheme this grid was built with.
    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    /// Parses a solution file against this grid.
    ///
    /// The file holds `rows × cols` integers; `0` and `-1` (and values
    /// at non-land positions) are skipped, and the remaining distinct
    /// labels are mapped to lots in first-seen order. Returns the
    /// per-land-cell assignment with [`NO_LOT`] for unassigned cells.
    pub fn parse_assignment(&self, input: &str) -> Result<Vec<usize>, GridError> {
        let mut tokens = Tokens::new(input);
        let mut assigned = vec![NO_LOT; self.nland];
        let mut label_to_lot: Vec<(i64, usize)> = Vec::new();
        for r in 0..self.rows {
            for c in 0..self.cols {
                let x = match tokens.next_int() {
                    Ok(x) => x,
                    Err(GridError::Truncated { .. }) => {
                        return Err(GridError::Truncated {
                            expected: self.rows * self.cols,
                            found: r * self.cols + c,
                        })
                    }
                    Err(e) => return Err(e),
                };
                if x == -1 || x == 0 {
                    continue;
                }
                let Some(idx) = self.index_at(r, c) else {
                    continue;
                };
                let lot = match label_to_lot.iter().find(|&&(label, _)| label == x) {
                    Some(&(_, lot)) => lot,
                    None => {
                        let lot = label_to_lot.len();
                        label_to_lot.push((x, lot));
                        lot
                    }
                };
                assigned[idx] = lot;
            }
        }
        if label_to_lot.len() > self.lots {
            return Err(GridError::TooManyLots {
                found: label_to_lot.len(),
                lots: self.lots,
            });
        }
        Ok(assigned)
    }
}

/// Whitespace token stream with positional error reporting.
struct Tokens<'a> {
    iter: std::str::SplitWhitespace<'a>,
    position: usize,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            iter: input.split_whitespace(),
            position: 0,
        }
    }

    fn next_int(&mut self) -> Result<i64, GridError> {
        match self.iter.next() {
            None => Err(GridError::Truncated {
                expected: self.position + 1,
                found: self.position,
            }),
            Some(tok) => {
                self.position += 1;
                tok.parse().map_err(|_| GridError::Token {
                    token: tok.to_owned(),
                    position: self.position,
                })
            }
        }
    }
}

/// Connected components of land cells over the raster, as raster indices.
fn land_components(
    rows: usize,
    cols: usize,
    kind: &[CellKind],
    offsets: &[(i64, i64)],
) -> Vec<Vec<usize>> {
    let mut components = Vec::new();
    let mut visited = vec![false; rows * cols];
    let mut queue = std::collections::VecDeque::new();
    for start in 0..rows * cols {
        if kind[start] != CellKind::Land || visited[start] {
            continue;
        }
        let mut cc = Vec::new();
        visited[start] = true;
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            cc.push(i);
            let (r, c) = (i / cols, i % cols);
            for &(dr, dc) in offsets {
                let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                if nr < 0 || nr >= rows as i64 || nc < 0 || nc >= cols as i64 {
                    continue;
                }
                let ni = nr as usize * cols + nc as usize;
                if kind[ni] == CellKind::Land && !visited[ni] {
                    visited[ni] = true;
                    queue.push_back(ni);
                }
            }
        }
        components.push(cc);
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> GridOptions {
        GridOptions::default()
    }

    /// 3×4 instance: one river cell, one preserved cell, ten land cells.
    const SMALL: &str = "3 4 2 5 10\n\
                         1 2 -1 3\n\
                         4 0 5 6\n\
                         7 8 9 1\n";

    #[test]
    fn test_parse_header_and_counts() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        assert_eq!((g.rows, g.cols, g.lots), (3, 4, 2));
        assert_eq!(g.apt_classes, 5);
        assert_eq!(g.river_pct, 10);
        assert_eq!(g.nland, 10);
        assert_eq!(g.nriver, 1);
    }

    #[test]
    fn test_values_in_raster_order() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        assert_eq!(g.values, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 1]);
    }

    #[test]
    fn test_river_adjacency_flags() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        // The river sits at (0, 2); with four-neighborhood its neighbors
        // are (0, 1), (0, 3) and (1, 2).
        let river_adjacent: Vec<usize> = (0..g.nland).filter(|&i| g.river_adjacent[i]).collect();
        let expect: Vec<usize> = [(0, 1), (0, 3), (1, 2)]
            .iter()
            .map(|&(r, c)| g.index_at(r, c).unwrap())
            .collect();
        assert_eq!(river_adjacent, expect);
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        for a in 0..g.nland {
            for &b in &g.neighbors[a] {
                assert!(g.neighbors[b].contains(&a), "{a} -> {b} not symmetric");
            }
        }
    }

    #[test]
    fn test_truncated_instance_fails() {
        let err = Grid::parse_str("2 2 1 1 0\n1 2 3", &opts()).unwrap_err();
        assert!(matches!(err, GridError::Truncated { expected: 4, found: 3 }));
    }

    #[test]
    fn test_malformed_token_fails() {
        let err = Grid::parse_str("2 2 1 1 0\n1 2 x 3", &opts()).unwrap_err();
        assert!(matches!(err, GridError::Token { .. }));
    }

    #[test]
    fn test_invalid_cell_value_fails() {
        let err = Grid::parse_str("1 2 1 1 0\n1 -7", &opts()).unwrap_err();
        assert!(matches!(err, GridError::CellValue { row: 0, col: 1, value: -7 }));
    }

    #[test]
    fn test_lot_count_bounds() {
        assert!(matches!(
            Grid::parse_str("1 2 0 1 0\n1 1", &opts()).unwrap_err(),
            GridError::LotCount { lots: 0 }
        ));
        assert!(Grid::parse_str("1 2 0 1 0\n1 1", &opts().with_lots(2)).is_ok());
    }

    #[test]
    fn test_lots_override_header() {
        let g = Grid::parse_str(SMALL, &opts().with_lots(3)).unwrap();
        assert_eq!(g.lots, 3);
    }

    #[test]
    fn test_tiny_component_is_reclassified() {
        // Two components: an 8-cell ring and an isolated corner cell.
        // With 3 lots the corner rounds to zero lots and is preserved;
        // the remainder goes to the ring.
        let input = "4 4 3 1 0\n\
                     1 1 1 0\n\
                     1 0 1 0\n\
                     1 1 1 0\n\
                     0 0 0 2\n";
        let g = Grid::parse_str(input, &opts()).unwrap();
        assert_eq!(g.nland, 8);
        assert_eq!(g.components.len(), 1);
        assert_eq!(g.component_lots, vec![3]);
        assert_eq!(g.kind[3 * 4 + 3], CellKind::Preserved);
    }

    #[test]
    fn test_infeasible_distribution_fails() {
        // Three isolated cells, 2 lots: every component rounds to 0,
        // so nothing survives and the remainder cannot be placed.
        let input = "3 3 2 1 0\n\
                     1 0 1\n\
                     0 0 0\n\
                     1 0 0\n";
        let err = Grid::parse_str(input, &opts()).unwrap_err();
        assert!(matches!(err, GridError::Infeasible { lots: 2, components: 3 }));
    }

    #[test]
    fn test_eight_neighborhood_merges_diagonals() {
        let input = "2 2 1 1 0\n\
                     1 0\n\
                     0 1\n";
        let four = Grid::parse_str(input, &opts()).unwrap_err();
        assert!(matches!(four, GridError::Infeasible { .. }));
        let eight =
            Grid::parse_str(input, &opts().with_neighborhood(Neighborhood::Eight)).unwrap();
        assert_eq!(eight.components.len(), 1);
        assert_eq!(eight.neighbors[0], vec![1]);
    }

    #[test]
    fn test_parse_assignment_first_seen_order() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        // Labels 9 and 4 appear in that order; 9 becomes lot 0.
        let sol = "9 9 -1 4\n\
                   9 0 4 4\n\
                   9 9 4 4\n";
        let assigned = g.parse_assignment(sol).unwrap();
        assert_eq!(assigned[g.index_at(0, 0).unwrap()], 0);
        assert_eq!(assigned[g.index_at(0, 3).unwrap()], 1);
        assert_eq!(assigned[g.index_at(2, 2).unwrap()], 1);
    }

    #[test]
    fn test_parse_assignment_too_many_lots() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        let sol = "1 2 -1 3\n\
                   4 0 5 6\n\
                   7 8 9 10\n";
        assert!(matches!(
            g.parse_assignment(sol).unwrap_err(),
            GridError::TooManyLots { found: 10, lots: 2 }
        ));
    }

    #[test]
    fn test_parse_assignment_truncated() {
        let g = Grid::parse_str(SMALL, &opts()).unwrap();
        assert!(matches!(
            g.parse_assignment("1 1 -1").unwrap_err(),
            GridError::Truncated { .. }
        ));
    }
}
