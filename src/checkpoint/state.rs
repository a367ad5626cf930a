//! Checkpoint state management for resumable runs.
//!
//! Epistemic foundation:
//! - K_i: Checkpoints track which game indices have been written
//! - K_i: The base seed is stored, so pending games regenerate identically
//! - K_i: State is persisted to disk atomically (write-then-rename)
//! - I^B: Unreadable checkpoint → previous save is loaded instead

use super::PendingOperation;
use crate::models::{CoverGameError, Result, RunStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Status of a game in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Not yet processed
    Pending,
    /// Solved and written to the output
    Solved,
    /// Skipped or failed during solving
    Failed,
}

/// Checkpoint entry for a single game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCheckpoint {
    /// Current status
    pub status: GameStatus,
    /// Best score if solved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    /// Number of optimal allocations if solved
    #[serde(default)]
    pub optimal: usize,
    /// Profiles evaluated if solved
    #[serde(default)]
    pub profiles: u64,
    /// Timestamp of last update
    pub updated_at: DateTime<Utc>,
}

/// Checkpoint state for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Run identifier
    pub run_id: String,
    /// Base seed; game i uses seed + i
    pub seed: u64,
    /// Total games to produce
    pub total_games: usize,
    /// Game statuses by index
    pub games: BTreeMap<usize, GameCheckpoint>,
    /// Statistics
    pub stats: CheckpointStats,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Statistics tracked in checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointStats {
    pub pending: usize,
    pub solved: usize,
    pub failed: usize,
    pub profiles_evaluated: u64,
    pub optimal_allocations: usize,
}

impl CheckpointState {
    /// Create a new checkpoint state.
    pub fn new(seed: u64, total_games: usize) -> Self {
        let now = Utc::now();
        let games = (0..total_games)
            .map(|index| {
                (
                    index,
                    GameCheckpoint {
                        status: GameStatus::Pending,
                        best_score: None,
                        optimal: 0,
                        profiles: 0,
                        updated_at: now,
                    },
                )
            })
            .collect();

        Self {
            run_id: Uuid::new_v4().to_string(),
            seed,
            total_games,
            games,
            stats: CheckpointStats {
                pending: total_games,
                ..Default::default()
            },
            started_at: now,
            updated_at: now,
        }
    }

    /// Get pending game indices in ascending order.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.games
            .iter()
            .filter(|(_, cp)| cp.status == GameStatus::Pending)
            .map(|(&index, _)| index)
            .collect()
    }

    /// Mark a game as solved.
    pub fn mark_solved(&mut self, index: usize, best_score: f64, optimal: usize, profiles: u64) {
        if let Some(cp) = self.games.get_mut(&index) {
            match cp.status {
                GameStatus::Pending => self.stats.pending -= 1,
                GameStatus::Failed => self.stats.failed -= 1,
                GameStatus::Solved => return,
            }
            cp.status = GameStatus::Solved;
            cp.best_score = Some(best_score);
            cp.optimal = optimal;
            cp.profiles = profiles;
            cp.updated_at = Utc::now();
            self.stats.solved += 1;
            self.stats.profiles_evaluated += profiles;
            self.stats.optimal_allocations += optimal;
        }
        self.updated_at = Utc::now();
    }

    /// Mark a game as failed.
    pub fn mark_failed(&mut self, index: usize) {
        if let Some(cp) = self.games.get_mut(&index) {
            match cp.status {
                GameStatus::Pending => self.stats.pending -= 1,
                GameStatus::Solved | GameStatus::Failed => return,
            }
            cp.status = GameStatus::Failed;
            cp.updated_at = Utc::now();
            self.stats.failed += 1;
        }
        self.updated_at = Utc::now();
    }

    /// Put a game back in the pending queue.
    pub fn mark_pending(&mut self, index: usize) {
        if let Some(cp) = self.games.get_mut(&index) {
            match cp.status {
                GameStatus::Pending => return,
                GameStatus::Solved => {
                    self.stats.solved -= 1;
                    self.stats.profiles_evaluated -= cp.profiles;
                    self.stats.optimal_allocations -= cp.optimal;
                }
                GameStatus::Failed => self.stats.failed -= 1,
            }
            cp.status = GameStatus::Pending;
            cp.best_score = None;
            cp.optimal = 0;
            cp.profiles = 0;
            cp.updated_at = Utc::now();
            self.stats.pending += 1;
        }
        self.updated_at = Utc::now();
    }

    /// Check if all games are processed.
    pub fn is_complete(&self) -> bool {
        self.stats.pending == 0
    }

    /// Get progress percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.total_games == 0 {
            return 100.0;
        }
        let processed = self.stats.solved + self.stats.failed;
        (processed as f64 / self.total_games as f64) * 100.0
    }

    /// Convert to RunStats.
    pub fn to_run_stats(&self, runtime_secs: f64) -> RunStats {
        let mut stats = RunStats {
            total_games: self.total_games,
            total_solved: self.stats.solved,
            total_failed: self.stats.failed,
            profiles_evaluated: self.stats.profiles_evaluated,
            optimal_allocations: self.stats.optimal_allocations,
            runtime_secs,
            ..Default::default()
        };
        stats.finalize();
        stats
    }
}

const CHECKPOINT_FILE: &str = "run.json";
const PREVIOUS_FILE: &str = "run.prev.json";
const STAGING_FILE: &str = "run.json.tmp";

/// Owns the checkpoint directory of one run.
///
/// Every save keeps the previous file next to the new one, and loading
/// falls back to it when the current file cannot be parsed.
pub struct CheckpointManager {
    dir: PathBuf,
    state: Option<CheckpointState>,
}

impl CheckpointManager {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| CoverGameError::io("creating checkpoint dir", e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            state: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        self.dir.join(CHECKPOINT_FILE).exists()
    }

    /// Start a fresh run or pick up the stored one.
    ///
    /// A stored run keeps its own seed and game count.
    pub fn init_or_load(&mut self, seed: u64, total_games: usize) -> Result<&CheckpointState> {
        if !self.exists() {
            self.state = Some(CheckpointState::new(seed, total_games));
            self.save()?;
            info!(total = total_games, seed, "Created new checkpoint");
            return self.require_state();
        }

        let state = self.load()?;
        if (state.seed, state.total_games) != (seed, total_games) {
            warn!(
                stored_seed = state.seed,
                stored_games = state.total_games,
                requested_seed = seed,
                requested_games = total_games,
                "Checkpoint parameters differ from request, using checkpoint"
            );
        }
        info!(
            pending = state.stats.pending,
            solved = state.stats.solved,
            "Resuming from checkpoint"
        );
        Ok(state)
    }

    /// Read the stored state, falling back to the previous save.
    pub fn load(&mut self) -> Result<&CheckpointState> {
        let state = match Self::read_state(&self.dir.join(CHECKPOINT_FILE)) {
            Ok(state) => state,
            Err(e) => {
                let previous = self.dir.join(PREVIOUS_FILE);
                if !previous.exists() {
                    return Err(e);
                }
                warn!(error = %e, "Checkpoint unreadable, falling back to previous save");
                Self::read_state(&previous)?
            }
        };
        Ok(&*self.state.insert(state))
    }

    fn read_state(path: &Path) -> Result<CheckpointState> {
        let file = File::open(path).map_err(|e| CoverGameError::io("opening checkpoint", e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CoverGameError::ParseError(format!("Invalid checkpoint {path:?}: {e}")))
    }

    /// Persist the state: previous copy, staging write, rename.
    pub fn save(&self) -> Result<()> {
        let state = self.require_state()?;
        let current = self.dir.join(CHECKPOINT_FILE);
        if current.exists() {
            fs::copy(&current, self.dir.join(PREVIOUS_FILE))
                .map_err(|e| CoverGameError::io("keeping previous checkpoint", e))?;
        }

        let staging = self.dir.join(STAGING_FILE);
        let mut writer = BufWriter::new(
            File::create(&staging).map_err(|e| CoverGameError::io("creating checkpoint", e))?,
        );
        serde_json::to_writer_pretty(&mut writer, state)
            .map_err(|e| CoverGameError::Internal(format!("Serializing checkpoint: {e}")))?;
        writer
            .flush()
            .map_err(|e| CoverGameError::io("flushing checkpoint", e))?;
        drop(writer);

        fs::rename(&staging, &current).map_err(|e| CoverGameError::io("renaming checkpoint", e))?;
        debug!(pending = state.stats.pending, "Checkpoint saved");
        Ok(())
    }

    pub fn state(&self) -> Option<&CheckpointState> {
        self.state.as_ref()
    }

    fn require_state(&self) -> Result<&CheckpointState> {
        self.state
            .as_ref()
            .ok_or_else(|| CoverGameError::Internal("Checkpoint not initialized".to_string()))
    }

    fn require_state_mut(&mut self) -> Result<&mut CheckpointState> {
        self.state
            .as_mut()
            .ok_or_else(|| CoverGameError::Internal("Checkpoint not initialized".to_string()))
    }

    /// Pending game indices; empty before init.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.state
            .as_ref()
            .map(CheckpointState::pending_indices)
            .unwrap_or_default()
    }

    /// Record a committed batch and save once.
    pub fn record_batch(&mut self, operations: &[PendingOperation]) -> Result<()> {
        let state = self.require_state_mut()?;
        for op in operations {
            match *op {
                PendingOperation::Solved {
                    index,
                    best_score,
                    optimal,
                    profiles,
                    ..
                } => state.mark_solved(index, best_score, optimal, profiles),
                PendingOperation::Failed { index, .. } => state.mark_failed(index),
            }
        }
        self.save()
    }

    /// Put games back in the queue and save.
    pub fn requeue(&mut self, indices: impl IntoIterator<Item = usize>) -> Result<()> {
        let state = self.require_state_mut()?;
        for index in indices {
            state.mark_pending(index);
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::FailureReason;
    use tempfile::TempDir;

    #[test]
    fn test_state_transitions_keep_stats_consistent() {
        let mut state = CheckpointState::new(5, 3);
        assert_eq!(state.pending_indices(), [0, 1, 2]);

        state.mark_solved(0, 1.5, 2, 16);
        state.mark_failed(2);
        assert_eq!(state.pending_indices(), [1]);
        assert_eq!(state.stats.pending, 1);
        assert_eq!(state.stats.solved, 1);
        assert_eq!(state.stats.failed, 1);
        assert!(!state.is_complete());

        // Solving twice does not double count.
        state.mark_solved(0, 1.5, 2, 16);
        assert_eq!(state.stats.profiles_evaluated, 16);

        state.mark_pending(0);
        assert_eq!(state.stats.solved, 0);
        assert_eq!(state.stats.profiles_evaluated, 0);
        assert_eq!(state.pending_indices(), [0, 1]);

        state.mark_solved(0, 1.5, 2, 16);
        state.mark_solved(1, 0.5, 1, 4);
        assert!(state.is_complete());
        assert!((state.progress_percent() - 100.0).abs() < f64::EPSILON);

        let stats = state.to_run_stats(0.0);
        assert_eq!(stats.total_solved, 2);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.optimal_allocations, 3);
    }

    #[test]
    fn test_manager_persists_and_resumes() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("ckpt");

        let mut mgr = CheckpointManager::new(&dir).unwrap();
        let run_id = mgr.init_or_load(99, 4).unwrap().run_id.clone();
        mgr.record_batch(&[
            PendingOperation::Solved {
                index: 1,
                best_score: 2.0,
                optimal: 1,
                profiles: 8,
                output_json: String::new(),
            },
            PendingOperation::Failed {
                index: 3,
                reason: FailureReason::TooManyProfiles,
            },
        ])
        .unwrap();
        assert!(dir.join(PREVIOUS_FILE).exists());

        let mut resumed = CheckpointManager::new(&dir).unwrap();
        // Different request parameters: the stored seed wins.
        let state = resumed.init_or_load(1, 10).unwrap();
        assert_eq!(state.run_id, run_id);
        assert_eq!(state.seed, 99);
        assert_eq!(state.total_games, 4);
        assert_eq!(resumed.pending_indices(), [0, 2]);
    }

    #[test]
    fn test_corrupt_checkpoint_falls_back_to_previous() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let mut mgr = CheckpointManager::new(dir).unwrap();
        mgr.init_or_load(7, 3).unwrap();
        mgr.requeue([0]).unwrap();
        fs::write(dir.join(CHECKPOINT_FILE), "{ truncated").unwrap();

        let mut resumed = CheckpointManager::new(dir).unwrap();
        let state = resumed.load().unwrap();
        assert_eq!(state.seed, 7);
        assert_eq!(state.pending_indices(), [0, 1, 2]);
    }

    #[test]
    fn test_uninitialized_manager_refuses_to_save() {
        let temp_dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(temp_dir.path()).unwrap();
        assert!(mgr.pending_indices().is_empty());
        assert!(matches!(mgr.save(), Err(CoverGameError::Internal(_))));
    }
}
