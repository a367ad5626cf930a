//! Solver pool for parallel exhaustive searches.
//!
//! Epistemic foundation:
//! - K_i: Each search is a pure function of one instance, so games solve
//!   independently
//! - K_i: Searches are CPU-bound and run on the blocking thread pool
//! - B_i: A game may be too large to search → Result
//! - I^R: Pool size and profile limit are configurable

use crate::models::{CoverGameError, Instance, Result};
use crate::search::{solve, Solution};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A game waiting to be solved, tagged with its index in the run.
#[derive(Debug, Clone)]
pub struct SolveJob {
    pub index: usize,
    pub instance: Instance,
}

/// A solved game.
#[derive(Debug, Clone)]
pub struct SolvedGame {
    pub index: usize,
    pub instance: Instance,
    pub solution: Solution,
}

/// Pool bounding how many searches run at once.
#[derive(Debug, Clone)]
pub struct SolverPool {
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// Pool size (max concurrent searches)
    pool_size: usize,
    /// Largest profile space a game may have
    max_profiles: u64,
}

impl SolverPool {
    /// Create a new solver pool.
    pub fn new(pool_size: usize, max_profiles: u64) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            max_profiles,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Reject games whose profile space exceeds the limit.
    pub fn check_size(&self, job: &SolveJob) -> Result<()> {
        let profiles = job.instance.profile_count();
        if profiles > u128::from(self.max_profiles) {
            return Err(CoverGameError::ProfileLimitExceeded {
                game: job.index,
                profiles,
                limit: self.max_profiles,
            });
        }
        Ok(())
    }

    /// Solve a single game.
    ///
    /// B_i(game fits the limit) → Result<SolvedGame>
    pub async fn solve(&self, job: SolveJob) -> Result<SolvedGame> {
        self.check_size(&job)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CoverGameError::Internal("Semaphore closed".to_string()))?;

        let SolveJob { index, instance } = job;
        let (instance, solution) = tokio::task::spawn_blocking(move || {
            let solution = solve(&instance);
            (instance, solution)
        })
        .await
        .map_err(|e| CoverGameError::TaskFailed(format!("game {index}: {e}")))?;

        debug!(
            game = index,
            profiles = solution.profiles_evaluated,
            optimal = solution.allocations.len(),
            "Solved game"
        );

        Ok(SolvedGame {
            index,
            instance,
            solution,
        })
    }

    /// Solve many games in parallel.
    ///
    /// Returns (solved_games, skipped_games), both sorted by game index.
    /// Per-game failures are collected; anything else aborts the batch.
    pub async fn solve_batch(
        &self,
        jobs: Vec<SolveJob>,
    ) -> Result<(Vec<SolvedGame>, Vec<(usize, CoverGameError)>)> {
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let pool = self.clone();
            let index = job.index;
            let handle = tokio::spawn(async move { (index, pool.solve(job).await) });
            handles.push(handle);
        }

        let mut solved = Vec::new();
        let mut failed = Vec::new();

        for handle in handles {
            match handle.await {
                Ok((_index, Ok(game))) => solved.push(game),
                Ok((index, Err(e))) if e.is_per_game() => {
                    warn!(game = index, error = %e, "Game skipped");
                    failed.push((index, e));
                }
                Ok((_index, Err(e))) => return Err(e),
                Err(e) => {
                    return Err(CoverGameError::TaskFailed(format!("solver task: {e}")));
                }
            }
        }

        solved.sort_by_key(|g| g.index);
        failed.sort_by_key(|(index, _)| *index);
        Ok((solved, failed))
    }
}
