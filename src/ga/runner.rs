//! The evolutionary loop.
//!
//! [`GaRunner`] evolves a population of solutions: tournament-selected
//! parents produce crossover offspring, offspring are mutated, a slice
//! of the population is rebuilt from fresh seed layouts, and the best
//! survivors carry over by partial selection. An optional restart
//! reseeds the whole population after a configured number of
//! generations without improvement.
//!
//! Two population buffers are swapped each generation; a solution is
//! owned by exactly one slot at a time. Time-budget exhaustion unwinds
//! through [`TimedOut`], keeps the best completed solution, and still
//! flushes the statistics.

use super::config::GaConfig;
use super::operators::{select_parents, Crossover, Mutation};
use crate::constructive::Constructive;
use crate::context::{SearchContext, TimedOut};
use crate::grid::Grid;
use crate::seeding::generate_seeds;
use crate::solution::Solution;
use crate::stats::RunStats;
use std::cmp::Ordering;

/// Result of a GA run.
#[derive(Debug)]
pub struct GaResult {
    /// Best solution found during the entire run. `None` only when the
    /// time budget expired before a single construction finished.
    pub best: Option<Solution>,
    /// Counters and per-generation records.
    pub stats: RunStats,
    /// Whether the run stopped on the wall-clock budget.
    pub timed_out: bool,
    /// Effective random seed of the run.
    pub seed: u64,
}

/// Executes the genetic algorithm.
///
/// # Usage
///
/// ```ignore
/// let grid = Grid::load("instance.txt", &GridOptions::default())?;
/// let result = GaRunner::run(&grid, &GaConfig::default().with_seed(42));
/// ```
pub struct GaRunner;

impl GaRunner {
    /// Runs the GA to completion (generation limit or time budget).
    ///
    /// # Panics
    /// Panics if the configuration is invalid (call [`GaConfig::validate`]
    /// first to get a descriptive error).
    pub fn run(grid: &Grid, config: &GaConfig) -> GaResult {
        config.validate().expect("invalid GaConfig");
        let mut ctx = SearchContext::new(config.seed, config.time_limit);
        let mut stats = RunStats::new();
        let mut best = None;

        let timed_out = evolve(grid, config, &mut ctx, &mut stats, &mut best).is_err();
        if timed_out {
            log::info!("time budget exhausted after {:.2?}", ctx.elapsed());
        }
        // Statistics are flushed on every termination path.
        stats.log_summary();
        GaResult {
            best,
            stats,
            timed_out,
            seed: ctx.seed(),
        }
    }
}

fn evolve(
    grid: &Grid,
    cfg: &GaConfig,
    ctx: &mut SearchContext,
    stats: &mut RunStats,
    best: &mut Option<Solution>,
) -> Result<(), TimedOut> {
    let (crossover_size, new_size, keep_size) = cfg.split();
    let max_ratio = cfg.construction.max_size_ratio;
    log::info!(
        "population {}: {} crossover, {} new, {} kept per generation",
        cfg.pop_size,
        crossover_size,
        new_size,
        keep_size
    );

    let mut cons = Constructive::new();
    let mut crossover = Crossover::new();
    let mut mutation = Mutation::new();
    let mut pop: Vec<Solution> = (0..cfg.pop_size).map(|_| Solution::new(grid)).collect();
    let mut next: Vec<Solution> = (0..cfg.pop_size).map(|_| Solution::new(grid)).collect();

    log::info!("building initial population");
    for sol in pop.iter_mut() {
        fresh_solution(sol, &mut cons, grid, cfg, ctx, stats)?;
        update_best(best, sol, max_ratio);
    }

    let mut best_since = 0usize;
    let mut best_key: Option<(i64, f64, i64)> = None;
    loop {
        let mut gen_best = 0;
        for i in 1..pop.len() {
            if pop[i].cmp_quality(&pop[gen_best], max_ratio) == Ordering::Less {
                gen_best = i;
            }
        }
        let key = quality_key(&pop[gen_best], max_ratio);
        if best_key.map_or(true, |b| key_less(key, b)) {
            best_key = Some(key);
            best_since = stats.generations;
        }
        stats.record(&pop[gen_best], grid.lots, ctx.elapsed());
        update_best(best, &pop[gen_best], max_ratio);

        ctx.check()?;
        if stats.generations >= cfg.max_generations {
            return Ok(());
        }
        stats.generations += 1;
        log::debug!("generation {}", stats.generations);

        let restart = cfg
            .restart
            .is_some_and(|r| stats.generations - best_since >= r);
        if restart {
            log::info!(
                "no improvement since generation {best_since}, reseeding the population"
            );
            best_since = stats.generations;
            best_key = None;
        } else {
            for i in 0..crossover_size {
                let (p1, p2) =
                    select_parents(&pop, cfg.tournament_size, max_ratio, &mut ctx.rng);
                if cfg.do_crossover {
                    stats.num_crossovers += 1;
                    let outcome = crossover.apply(
                        &pop[p1],
                        &pop[p2],
                        &mut next[i],
                        &mut cons,
                        grid,
                        &cfg.construction,
                        ctx,
                    )?;
                    stats.num_disconnected_crossover_lots += outcome.disconnected_lots;
                    if outcome.reseeded {
                        stats.num_empty_crossover_lots += 1;
                    }
                } else {
                    let better = if pop[p1].cmp_quality(&pop[p2], max_ratio) == Ordering::Less {
                        p1
                    } else {
                        p2
                    };
                    next[i].clone_from(&pop[better]);
                }
                if cfg.do_mutation {
                    stats.num_mutations += 1;
                    mutation.apply(
                        &mut next[i],
                        &mut cons,
                        grid,
                        &cfg.construction,
                        cfg.brush_radius,
                        ctx,
                    )?;
                }
                debug_assert_eq!(next[i].validate(grid), Ok(()));
            }
        }

        let fill = if restart {
            0..cfg.pop_size
        } else {
            crossover_size..crossover_size + new_size
        };
        for i in fill {
            fresh_solution(&mut next[i], &mut cons, grid, cfg, ctx, stats)?;
            if restart {
                let key = quality_key(&next[i], max_ratio);
                if best_key.map_or(true, |b| key_less(key, b)) {
                    best_key = Some(key);
                }
            }
        }

        if !restart && keep_size > 0 {
            if keep_size < pop.len() {
                pop.select_nth_unstable_by(keep_size, |a, b| a.cmp_quality(b, max_ratio));
            }
            for i in crossover_size + new_size..cfg.pop_size {
                std::mem::swap(&mut next[i], &mut pop[i - crossover_size - new_size]);
            }
        }
        std::mem::swap(&mut pop, &mut next);
    }
}

/// Rebuilds `sol` from a fresh seed layout.
fn fresh_solution(
    sol: &mut Solution,
    cons: &mut Constructive,
    grid: &Grid,
    cfg: &GaConfig,
    ctx: &mut SearchContext,
    stats: &mut RunStats,
) -> Result<(), TimedOut> {
    sol.reset();
    let seeds = generate_seeds(grid, ctx);
    stats.num_new_solutions += 1;
    cons.construct_from_seeds(sol, &seeds, false, grid, &cfg.construction, ctx)?;
    debug_assert_eq!(sol.validate(grid), Ok(()));
    Ok(())
}

fn update_best(best: &mut Option<Solution>, sol: &Solution, max_ratio: i64) {
    let improved = best
        .as_ref()
        .map_or(true, |b| sol.cmp_quality(b, max_ratio) == Ordering::Less);
    if improved {
        match best {
            Some(b) => b.clone_from(sol),
            None => *best = Some(sol.clone()),
        }
    }
}

/// Improvement-tracking tuple, compared exactly (no epsilon).
fn quality_key(sol: &Solution, max_ratio: i64) -> (i64, f64, i64) {
    (sol.river_excess(), sol.size_ratio(max_ratio), sol.value())
}

fn key_less(a: (i64, f64, i64), b: (i64, f64, i64)) -> bool {
    a.0 < b.0 || (a.0 == b.0 && (a.1 < b.1 || (a.1 == b.1 && a.2 < b.2)))
}
