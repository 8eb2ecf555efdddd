//! Run statistics.
//!
//! Operator counters and one [`Record`] per reported solution
//! (normalized objective, fairness excess and violations, raw size
//! ratio, timestamp). The GA driver records the generation best each
//! generation and flushes the collection unconditionally when the run
//! ends, including on time-budget exhaustion.

use crate::solution::Solution;
use std::time::Duration;

/// Quality snapshot of one reported solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Record {
    /// Normalized objective: `sqrt(value / lots)`.
    pub value: f64,
    /// River-fairness excess.
    pub excess: i64,
    /// River-fairness violation count.
    pub violations: i64,
    /// Raw (unthresholded) largest-to-smallest area ratio.
    pub size_ratio: f64,
    /// Time since the run started.
    pub elapsed: Duration,
}

/// Min/avg/max/σ summary of one recorded measure.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Counters and per-generation records of one search run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStats {
    /// Generations completed.
    pub generations: usize,
    /// Solutions built from scratch by the constructive heuristic.
    pub num_new_solutions: usize,
    /// Crossover applications.
    pub num_crossovers: usize,
    /// Mutation applications.
    pub num_mutations: usize,
    /// Matched lot pairs that split into several components during
    /// crossover.
    pub num_disconnected_crossover_lots: usize,
    /// Crossovers that left lot slots empty and had to reseed them.
    pub num_empty_crossover_lots: usize,
    /// One record per reported solution, in report order.
    pub records: Vec<Record>,
}

impl RunStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a solution's quality snapshot.
    pub fn record(&mut self, sol: &Solution, lots: usize, elapsed: Duration) {
        let record = Record {
            value: (sol.value() as f64 / lots as f64).sqrt(),
            excess: sol.river_excess(),
            violations: sol.river_violations(),
            size_ratio: sol.raw_size_ratio(),
            elapsed,
        };
        log::debug!(
            "value {:.2} excess {} violations {} size_ratio {:.2} time {:.2?}",
            record.value,
            record.excess,
            record.violations,
            record.size_ratio,
            record.elapsed
        );
        self.records.push(record);
    }

    /// Summary of the normalized objective values.
    pub fn value_summary(&self) -> Option<Summary> {
        summarize(self.records.iter().map(|r| r.value))
    }

    /// Summary of the fairness excesses.
    pub fn excess_summary(&self) -> Option<Summary> {
        summarize(self.records.iter().map(|r| r.excess as f64))
    }

    /// Summary of the raw size ratios.
    pub fn size_ratio_summary(&self) -> Option<Summary> {
        summarize(self.records.iter().map(|r| r.size_ratio))
    }

    /// Logs the closing summary. Called on every termination path.
    pub fn log_summary(&self) {
        log::info!(
            "finished after {} generation(s): {} construction(s), {} crossover(s) \
             ({} disconnected lot(s), {} reseeded), {} mutation(s)",
            self.generations,
            self.num_new_solutions,
            self.num_crossovers,
            self.num_disconnected_crossover_lots,
            self.num_empty_crossover_lots,
            self.num_mutations,
        );
        if let (Some(value), Some(excess), Some(ratio)) = (
            self.value_summary(),
            self.excess_summary(),
            self.size_ratio_summary(),
        ) {
            log::info!(
                "value min {:.2} avg {:.2} max {:.2} | excess min {:.0} avg {:.2} max {:.0} \
                 | size_ratio min {:.2} avg {:.2} max {:.2}",
                value.min,
                value.avg,
                value.max,
                excess.min,
                excess.avg,
                excess.max,
                ratio.min,
                ratio.avg,
                ratio.max,
            );
        }
    }
}

fn summarize(values: impl Iterator<Item = f64>) -> Option<Summary> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let avg = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>() / n;
    Some(Summary {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        avg,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev: var.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, GridOptions};

    fn grid() -> Grid {
        Grid::parse_str("2 4 2 1 0\n1 1 1 1 1 1 1 1", &GridOptions::default()).unwrap()
    }

    #[test]
    fn test_record_normalizes_value() {
        let g = grid();
        let mut s = Solution::new(&g);
        s.populate(&[0, 0, 0, 1, 1, 1, 1, 1], &g);
        // Lot values 3 and 5: value = 9 + 25 - 64/2 = 2.
        let mut stats = RunStats::new();
        stats.record(&s, g.lots, Duration::from_millis(5));
        let r = &stats.records[0];
        assert!((r.value - (2.0f64 / 2.0).sqrt()).abs() < 1e-12);
        assert_eq!(r.excess, 0);
        assert!((r.size_ratio - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_summaries_match_direct_computation() {
        let g = grid();
        let mut stats = RunStats::new();
        let mut s = Solution::new(&g);
        for split in [4usize, 3, 2] {
            let assigned: Vec<usize> = (0..8).map(|c| usize::from(c >= split)).collect();
            s.populate(&assigned, &g);
            stats.record(&s, g.lots, Duration::ZERO);
        }
        let sum = stats.size_ratio_summary().unwrap();
        let ratios = [1.0, 5.0 / 3.0, 3.0];
        let avg = ratios.iter().sum::<f64>() / 3.0;
        assert!((sum.min - 1.0).abs() < 1e-12);
        assert!((sum.max - 3.0).abs() < 1e-12);
        assert!((sum.avg - avg).abs() < 1e-12);
        let var = ratios.iter().map(|r| (r - avg) * (r - avg)).sum::<f64>() / 3.0;
        assert!((sum.std_dev - var.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_summary_is_none() {
        assert!(RunStats::new().value_summary().is_none());
    }
}
