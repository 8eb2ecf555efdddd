//! GA configuration.
//!
//! [`GaConfig`] holds all parameters that control the evolutionary loop
//! and the constructive heuristic it drives.

use crate::constructive::BuildConfig;
use std::time::Duration;

/// Configuration for the genetic algorithm.
///
/// # Defaults
///
/// ```
/// use terralot::ga::GaConfig;
///
/// let config = GaConfig::default();
/// assert_eq!(config.pop_size, 20);
/// assert_eq!(config.tournament_size, 3);
/// ```
///
/// # Builder pattern
///
/// ```
/// use terralot::ga::GaConfig;
///
/// let config = GaConfig::default()
///     .with_pop_size(50)
///     .with_max_generations(2000)
///     .with_seed(42);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaConfig {
    /// Number of solutions in the population.
    pub pop_size: usize,

    /// Maximum number of generations before termination.
    pub max_generations: usize,

    /// Share of the population produced by crossover each generation.
    ///
    /// The three shares are normalized by their sum, so they need not
    /// add up to one.
    pub crossover_ratio: f64,

    /// Share of the population rebuilt from fresh seed layouts.
    pub new_ratio: f64,

    /// Share of the population carried over as elites.
    pub keep_ratio: f64,

    /// Whether offspring slots actually recombine two parents. When
    /// disabled, the better tournament parent is copied instead.
    pub do_crossover: bool,

    /// Whether offspring are mutated.
    pub do_mutation: bool,

    /// Tournament size for parent selection (3 or more).
    pub tournament_size: usize,

    /// Erosion depth of the mutation operator, in cells.
    pub brush_radius: i64,

    /// Restart the whole population after this many generations without
    /// improvement. `None` disables restarts.
    pub restart: Option<usize>,

    /// Random seed for reproducibility. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Wall-clock budget for the entire run. `None` runs until the
    /// generation limit. The budget is polled inside every unbounded
    /// loop, so exhaustion stops construction mid-way and the best
    /// completed solution is kept.
    pub time_limit: Option<Duration>,

    /// Parameters of the constructive heuristic.
    pub construction: BuildConfig,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            pop_size: 20,
            max_generations: 1000,
            crossover_ratio: 0.5,
            new_ratio: 0.1,
            keep_ratio: 0.4,
            do_crossover: true,
            do_mutation: true,
            tournament_size: 3,
            brush_radius: 10,
            restart: None,
            seed: None,
            time_limit: None,
            construction: BuildConfig::default(),
        }
    }
}

impl GaConfig {
    /// Sets the population size.
    pub fn with_pop_size(mut self, n: usize) -> Self {
        self.pop_size = n;
        self
    }

    /// Sets the maximum number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the crossover/new/keep population shares.
    pub fn with_ratios(mut self, crossover: f64, new: f64, keep: f64) -> Self {
        self.crossover_ratio = crossover;
        self.new_ratio = new;
        self.keep_ratio = keep;
        self
    }

    /// Enables or disables crossover.
    pub fn with_crossover(mut self, enabled: bool) -> Self {
        self.do_crossover = enabled;
        self
    }

    /// Enables or disables mutation.
    pub fn with_mutation(mut self, enabled: bool) -> Self {
        self.do_mutation = enabled;
        self
    }

    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }

    /// Sets the mutation erosion depth.
    pub fn with_brush_radius(mut self, radius: i64) -> Self {
        self.brush_radius = radius;
        self
    }

    /// Sets the restart threshold (`None` disables restarts).
    pub fn with_restart(mut self, generations: Option<usize>) -> Self {
        self.restart = generations;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Sets the construction batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.construction.batch_size = batch_size;
        self
    }

    /// Sets the tolerated lot size ratio.
    pub fn with_max_size_ratio(mut self, ratio: i64) -> Self {
        self.construction.max_size_ratio = ratio;
        self
    }

    /// Population split `(crossover, new, keep)` derived from the
    /// normalized shares. The keep slice absorbs the rounding remainder.
    pub fn split(&self) -> (usize, usize, usize) {
        let sum = self.crossover_ratio + self.new_ratio + self.keep_ratio;
        let crossover = (self.pop_size as f64 * (self.crossover_ratio / sum)) as usize;
        let new = (self.pop_size as f64 * (self.new_ratio / sum)) as usize;
        (crossover, new, self.pop_size - crossover - new)
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.pop_size < 2 {
            return Err("pop_size must be at least 2".into());
        }
        if self.max_generations == 0 {
            return Err("max_generations must be at least 1".into());
        }
        if self.tournament_size < 3 {
            return Err("tournament_size must be at least 3".into());
        }
        if self.pop_size < self.tournament_size {
            return Err("pop_size must be at least the tournament size".into());
        }
        if self.crossover_ratio < 0.0 || self.new_ratio < 0.0 || self.keep_ratio < 0.0 {
            return Err("population shares must be non-negative".into());
        }
        if self.crossover_ratio + self.new_ratio + self.keep_ratio <= 0.0 {
            return Err("population shares must sum to a positive value".into());
        }
        if self.brush_radius < 1 {
            return Err("brush_radius must be at least 1".into());
        }
        if self.time_limit == Some(Duration::ZERO) {
            return Err("time_limit must be positive or None".into());
        }
        self.construction.validate()
    }
}
