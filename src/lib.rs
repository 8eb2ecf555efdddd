//! Fair land-allocation search engine.
//!
//! Partitions a rasterized terrain into a fixed number of contiguous
//! regions ("lots") while minimizing three competing unfairness measures
//! at once:
//!
//! - **Value variance**: the variance of per-lot aggregate land value,
//!   tracked incrementally by [`objective::ObjectiveTracker`].
//! - **River fairness**: the total area by which river-adjacent lots
//!   exceed the smallest river-free lot, tracked incrementally by
//!   [`rivers::RiverTracker`].
//! - **Size ratio**: the ratio between the largest and smallest lot.
//!
//! The search combines a batched greedy construction
//! ([`constructive::Constructive`]) over Voronoi-style seed layouts
//! ([`seeding`]) with a genetic algorithm ([`ga::GaRunner`]) whose
//! crossover pairs parent lots by minimum-cost bipartite matching
//! ([`matching`]) and whose mutation erodes and regrows lot boundaries.
//!
//! # Architecture
//!
//! The grid ([`grid::Grid`]) is immutable and shared read-only by all
//! solutions. Each [`solution::Solution`] owns its two incremental
//! trackers and is exclusively owned by one population slot at a time.
//! All randomness and the wall-clock budget flow through an explicit
//! [`context::SearchContext`]; every unbounded loop polls the budget and
//! unwinds cooperatively when it is exhausted.

pub mod constructive;
pub mod context;
pub mod ga;
pub mod grid;
pub mod matching;
pub mod objective;
pub mod rivers;
pub mod seeding;
pub mod solution;
pub mod stats;
