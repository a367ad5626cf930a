//! covergame - Synthetic resource allocation games with welfare-optimal labels.
//!
//! ## Architecture
//!
//! - **Generator**: Builds random games (resources → agents → action sets),
//!   then trims random actions
//! - **Search**: Enumerates every action profile and keeps all profiles
//!   reaching the maximum covered value
//! - **Solver Pool**: Runs independent searches in parallel
//!
//! ## Payoff
//!
//! A profile is worth the summed value of the distinct resources it covers;
//! a resource picked by several agents counts once.
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Instance size limits, filesystem failures

pub mod checkpoint;
pub mod generator;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod search;

// Re-exports for convenience
pub use checkpoint::{CheckpointManager, CheckpointState};
pub use generator::{GameBuilder, GameGenerator};
pub use models::{Config, CoverGameError, GameRecord, Instance, Result, RunStats};
pub use pipeline::GeneratePipeline;
pub use pool::SolverPool;
pub use search::{evaluate, solve, OptimumTracker, ProfileEnumerator, Solution};
