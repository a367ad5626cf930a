//! Journaled batch commits for checkpointed runs.
//!
//! Epistemic foundation:
//! - K_i: A batch reaches the output file whole or not at all
//! - K_i: The journal records the output length before the append, so a
//!   half-written batch can be cut off again
//! - I^B: Crash before the checkpoint records the batch → `recover`
//!   truncates the output and hands the batch back for regeneration

use crate::models::{CoverGameError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Why a game was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Profile space larger than the configured limit
    TooManyProfiles,
    /// Blocking search task panicked or was cancelled
    TaskFailed,
}

/// One game's outcome within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingOperation {
    /// Game solved, with its serialized document
    Solved {
        index: usize,
        best_score: f64,
        optimal: usize,
        profiles: u64,
        output_json: String,
    },
    /// Game skipped or failed
    Failed { index: usize, reason: FailureReason },
}

impl PendingOperation {
    /// Game index the operation refers to.
    pub fn index(&self) -> usize {
        match self {
            Self::Solved { index, .. } | Self::Failed { index, .. } => *index,
        }
    }
}

/// Journal written right before a batch is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionState {
    pub id: String,
    /// Output file length before the append
    pub output_len: u64,
    pub operations: Vec<PendingOperation>,
    pub started_at: DateTime<Utc>,
}

/// A batch of game outcomes waiting to be appended to the output.
///
/// Operations are buffered in memory; nothing touches disk before
/// [`Transaction::commit`].
pub struct Transaction {
    id: String,
    journal_path: PathBuf,
    output_path: PathBuf,
    operations: Vec<PendingOperation>,
    started_at: DateTime<Utc>,
    finished: bool,
}

impl Transaction {
    /// Begin a new transaction whose journal lives in `checkpoint_dir`.
    pub fn begin(checkpoint_dir: &Path, output_path: &Path) -> Self {
        let started_at = Utc::now();
        let id = format!(
            "tx_{}_{}",
            started_at.format("%Y%m%d_%H%M%S_%3f"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let journal_path = checkpoint_dir.join(format!("{id}.journal.json"));
        debug!(tx_id = %id, "Transaction started");

        Self {
            id,
            journal_path,
            output_path: output_path.to_path_buf(),
            operations: Vec::new(),
            started_at,
            finished: false,
        }
    }

    pub fn record_solved(
        &mut self,
        index: usize,
        best_score: f64,
        optimal: usize,
        profiles: u64,
        output_json: String,
    ) {
        self.operations.push(PendingOperation::Solved {
            index,
            best_score,
            optimal,
            profiles,
            output_json,
        });
    }

    pub fn record_failed(&mut self, index: usize, reason: FailureReason) {
        self.operations
            .push(PendingOperation::Failed { index, reason });
    }

    /// Append every solved game's line to the output.
    ///
    /// Order: journal (with the pre-append length) → append + fsync. The
    /// journal stays until [`Committed::finish`], after the checkpoint has
    /// recorded the batch.
    pub fn commit(mut self) -> Result<Committed> {
        let mut output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .map_err(|e| CoverGameError::io("opening output file", e))?;
        let output_len = output
            .metadata()
            .map_err(|e| CoverGameError::io("reading output metadata", e))?
            .len();

        let state = TransactionState {
            id: self.id.clone(),
            output_len,
            operations: std::mem::take(&mut self.operations),
            started_at: self.started_at,
        };
        self.write_journal(&state)?;

        let mut buffer = String::new();
        for op in &state.operations {
            if let PendingOperation::Solved { output_json, .. } = op {
                buffer.push_str(output_json);
                buffer.push('\n');
            }
        }
        if !buffer.is_empty() {
            output
                .write_all(buffer.as_bytes())
                .map_err(|e| CoverGameError::io("appending to output", e))?;
            output
                .sync_all()
                .map_err(|e| CoverGameError::io("syncing output", e))?;
        }

        self.finished = true;
        debug!(tx_id = %self.id, ops = state.operations.len(), bytes = buffer.len(), "Transaction committed");
        Ok(Committed {
            journal_path: self.journal_path.clone(),
            operations: state.operations,
        })
    }

    /// Discard the batch. Nothing was written, so nothing is undone.
    pub fn abort(mut self) {
        self.finished = true;
        debug!(tx_id = %self.id, ops = self.operations.len(), "Transaction aborted");
    }

    /// Roll back commits interrupted by a crash.
    ///
    /// Truncates the output to the length each journal recorded and returns
    /// the journaled operations, whose games must be processed again.
    pub fn recover(checkpoint_dir: &Path, output_path: &Path) -> Result<Option<Vec<PendingOperation>>> {
        let pattern = checkpoint_dir.join("tx_*.journal.json");
        let mut journals: Vec<TransactionState> = Vec::new();
        let paths: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| CoverGameError::Internal(format!("Invalid glob pattern: {e}")))?
            .filter_map(|r| r.ok())
            .collect();

        for path in &paths {
            let content = fs::read_to_string(path)
                .map_err(|e| CoverGameError::io("reading transaction journal", e))?;
            let state: TransactionState = serde_json::from_str(&content).map_err(|e| {
                CoverGameError::ParseError(format!("Invalid transaction journal: {e}"))
            })?;
            journals.push(state);
        }

        if journals.is_empty() {
            return Ok(None);
        }

        // The earliest interrupted commit marks the last known-good length.
        if let Some(keep) = journals.iter().map(|s| s.output_len).min() {
            if output_path.exists() {
                let output = OpenOptions::new()
                    .write(true)
                    .open(output_path)
                    .map_err(|e| CoverGameError::io("opening output for rollback", e))?;
                let len = output
                    .metadata()
                    .map_err(|e| CoverGameError::io("reading output metadata", e))?
                    .len();
                if len > keep {
                    warn!(from = len, to = keep, "Truncating partially committed output");
                    output
                        .set_len(keep)
                        .map_err(|e| CoverGameError::io("truncating output", e))?;
                }
            }
        }

        let mut recovered = Vec::new();
        for (path, state) in paths.iter().zip(journals) {
            warn!(tx_id = %state.id, ops = state.operations.len(), "Rolled back interrupted transaction");
            recovered.extend(state.operations);
            fs::remove_file(path)
                .map_err(|e| CoverGameError::io("removing transaction journal", e))?;
        }

        Ok(Some(recovered))
    }

    /// Durably place the journal before any output byte is appended.
    fn write_journal(&self, state: &TransactionState) -> Result<()> {
        let content = serde_json::to_vec(state)
            .map_err(|e| CoverGameError::Internal(format!("Serializing transaction: {e}")))?;
        let temp_path = self.journal_path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| CoverGameError::io("creating transaction journal", e))?;
        file.write_all(&content)
            .map_err(|e| CoverGameError::io("writing transaction journal", e))?;
        file.sync_all()
            .map_err(|e| CoverGameError::io("syncing transaction journal", e))?;
        drop(file);

        fs::rename(&temp_path, &self.journal_path)
            .map_err(|e| CoverGameError::io("renaming transaction journal", e))?;
        if let Some(dir) = self.journal_path.parent() {
            sync_dir(dir)?;
        }
        Ok(())
    }
}

/// Persist a rename by syncing its directory entry.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| CoverGameError::io("syncing checkpoint dir", e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished && !self.operations.is_empty() {
            warn!(
                tx_id = %self.id,
                ops = self.operations.len(),
                "Transaction dropped without commit/abort, games stay pending"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn journals(dir: &Path) -> Vec<PathBuf> {
        glob::glob(&dir.join("*.journal.json").to_string_lossy())
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_commit_appends_solved_lines_only() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("games.jsonl");
        fs::write(&output_path, "{\"game\": -1}\n").unwrap();

        let mut tx = Transaction::begin(temp_dir.path(), &output_path);
        tx.record_solved(0, 1.25, 2, 16, r#"{"game": 0}"#.to_string());
        tx.record_failed(1, FailureReason::TooManyProfiles);
        tx.record_solved(2, 0.75, 1, 8, r#"{"game": 2}"#.to_string());

        let committed = tx.commit().unwrap();
        assert_eq!(
            committed
                .operations
                .iter()
                .map(PendingOperation::index)
                .collect::<Vec<_>>(),
            [0, 1, 2]
        );
        assert_eq!(journals(temp_dir.path()).len(), 1);

        let output = fs::read_to_string(&output_path).unwrap();
        assert_eq!(output, "{\"game\": -1}\n{\"game\": 0}\n{\"game\": 2}\n");

        committed.finish().unwrap();
        assert!(journals(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_abort_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("games.jsonl");

        let mut tx = Transaction::begin(temp_dir.path(), &output_path);
        tx.record_solved(0, 1.0, 1, 4, r#"{"game": 0}"#.to_string());
        tx.abort();

        assert!(!output_path.exists());
        assert!(journals(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_recover_truncates_partial_batch() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("games.jsonl");
        let good = "{\"game\": 0}\n";
        // Good line plus a torn line from an interrupted commit
        fs::write(&output_path, format!("{good}{{\"game\": 1")).unwrap();

        let state = TransactionState {
            id: "tx_test".to_string(),
            output_len: good.len() as u64,
            operations: vec![PendingOperation::Solved {
                index: 1,
                best_score: 2.0,
                optimal: 1,
                profiles: 12,
                output_json: "{\"game\": 1}".to_string(),
            }],
            started_at: Utc::now(),
        };
        let journal = temp_dir.path().join("tx_test.journal.json");
        fs::write(&journal, serde_json::to_string(&state).unwrap()).unwrap();

        let ops = Transaction::recover(temp_dir.path(), &output_path)
            .unwrap()
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].index(), 1);
        assert_eq!(fs::read_to_string(&output_path).unwrap(), good);
        assert!(!journal.exists());

        assert!(Transaction::recover(temp_dir.path(), &output_path)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unfinished_commit_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("games.jsonl");

        let mut tx = Transaction::begin(temp_dir.path(), &output_path);
        tx.record_solved(3, 1.0, 1, 4, r#"{"game": 3}"#.to_string());
        let committed = tx.commit().unwrap();
        drop(committed);

        let ops = Transaction::recover(temp_dir.path(), &output_path)
            .unwrap()
            .unwrap();
        assert_eq!(ops[0].index(), 3);
        assert_eq!(fs::read_to_string(&output_path).unwrap(), "");
    }

    #[test]
    fn test_journal_is_in_place_before_finish() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("games.jsonl");
        fs::write(&output_path, "{\"game\": 0}\n").unwrap();

        let mut tx = Transaction::begin(temp_dir.path(), &output_path);
        tx.record_solved(1, 1.0, 1, 4, r#"{"game": 1}"#.to_string());
        let committed = tx.commit().unwrap();

        let paths = journals(temp_dir.path());
        assert_eq!(paths.len(), 1);
        let state: TransactionState =
            serde_json::from_str(&fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(state.output_len, "{\"game\": 0}\n".len() as u64);
        assert_eq!(state.operations.len(), 1);
        // No staging file left behind.
        assert!(!paths[0].with_extension("tmp").exists());

        committed.finish().unwrap();
    }
}
