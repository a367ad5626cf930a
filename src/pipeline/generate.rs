//! Game generation pipeline.
//!
//! Pipeline flow:
//! Seed → Game Generator → Solver Pool → Game Records → JSONL / JSON

use crate::checkpoint::{CheckpointManager, FailureReason, PendingOperation, Transaction};
use crate::generator::{entropy_seed, GameGenerator};
use crate::models::{
    Config, CoverGameError, GameBatch, GameRecord, OutputFormat, Result, RunStats,
};
use crate::pool::{SolveJob, SolvedGame, SolverPool};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Pipeline producing solved random games.
pub struct GeneratePipeline {
    generator: GameGenerator,
    pool: SolverPool,
    config: Config,
    seed: u64,
}

impl GeneratePipeline {
    /// Create a new pipeline from configuration.
    ///
    /// Without a configured seed, one is drawn from OS entropy and logged so
    /// the run can be reproduced.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let seed = match config.generation.seed {
            Some(seed) => seed,
            None => {
                let seed = entropy_seed();
                info!(seed, "No seed configured, drew one from entropy");
                seed
            }
        };

        Ok(Self {
            generator: GameGenerator::new(config.game.clone()),
            pool: SolverPool::new(config.generation.workers, config.generation.max_profiles),
            config,
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Read one game document and solve it.
    ///
    /// Documents over `max_profiles` are refused like generated games.
    pub fn solve_document(path: &Path, max_profiles: u64) -> Result<GameRecord> {
        let file = File::open(path).map_err(|e| CoverGameError::io("opening game file", e))?;
        let record: GameRecord = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CoverGameError::ParseError(format!("{}: {e}", path.display())))?;

        let instance = record.to_instance()?;
        let profiles = instance.profile_count();
        if profiles > u128::from(max_profiles) {
            return Err(CoverGameError::ProfileLimitExceeded {
                game: 0,
                profiles,
                limit: max_profiles,
            });
        }
        let solution = crate::search::solve(&instance);
        info!(
            agents = instance.agent_count(),
            resources = instance.resource_count(),
            profiles = solution.profiles_evaluated,
            best_score = solution.best_score,
            optimal = solution.allocations.len(),
            "Solved game document"
        );
        Ok(GameRecord::from_solved(&instance, &solution))
    }

    fn batch_size(&self) -> usize {
        (self.config.generation.workers * 2).max(10)
    }

    fn jobs(&self, seed: u64, indices: &[usize]) -> Vec<SolveJob> {
        indices
            .iter()
            .map(|&index| SolveJob {
                index,
                instance: self.generator.generate_seeded(seed, index),
            })
            .collect()
    }

    fn progress_bar(total: usize) -> Result<ProgressBar> {
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
            .map_err(|e| CoverGameError::Internal(format!("Progress template: {e}")))?
            .progress_chars("##-");
        pb.set_style(style);
        Ok(pb)
    }

    fn to_json_line(game: &SolvedGame) -> Result<String> {
        let record = GameRecord::from_solved(&game.instance, &game.solution);
        serde_json::to_string(&record)
            .map_err(|e| CoverGameError::Internal(format!("Failed to serialize game: {e}")))
    }

    fn create_parent_dir(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .map_err(|e| CoverGameError::io("creating output directory", e)),
            _ => Ok(()),
        }
    }

    /// Run the pipeline, writing every game of the run.
    pub async fn run(&self, output_path: &Path) -> Result<RunStats> {
        let start = Instant::now();
        let total = self.config.generation.num_games;

        info!(
            total_games = total,
            agents = self.config.game.num_agents,
            resources = self.config.game.num_resources,
            workers = self.pool.pool_size(),
            seed = self.seed,
            "Starting generation pipeline"
        );

        let pb = Self::progress_bar(total)?;

        Self::create_parent_dir(output_path)?;
        let output_file =
            File::create(output_path).map_err(|e| CoverGameError::io("creating output file", e))?;
        let mut writer = BufWriter::new(output_file);

        let mut stats = RunStats {
            total_games: total,
            ..Default::default()
        };
        let mut document = GameBatch::default();

        let indices: Vec<usize> = (0..total).collect();
        for batch in indices.chunks(self.batch_size()) {
            let jobs = self.jobs(self.seed, batch);
            let (solved, failed) = self.pool.solve_batch(jobs).await?;

            if !failed.is_empty() {
                warn!(count = failed.len(), "Some games were skipped");
            }
            stats.total_failed += failed.len();

            for game in &solved {
                stats.record(&game.solution);
                match self.config.output.format {
                    OutputFormat::Jsonl => {
                        let json = Self::to_json_line(game)?;
                        writeln!(writer, "{json}")
                            .map_err(|e| CoverGameError::io("writing output", e))?;
                    }
                    OutputFormat::Json => document
                        .games
                        .push(GameRecord::from_solved(&game.instance, &game.solution)),
                }
            }

            writer
                .flush()
                .map_err(|e| CoverGameError::io("flushing output", e))?;

            pb.inc(batch.len() as u64);
            pb.set_message(format!(
                "solved: {}, skipped: {}",
                stats.total_solved, stats.total_failed
            ));
        }

        if self.config.output.format == OutputFormat::Json {
            serde_json::to_writer(&mut writer, &document)
                .map_err(|e| CoverGameError::Internal(format!("Failed to serialize games: {e}")))?;
            writeln!(writer).map_err(|e| CoverGameError::io("writing output", e))?;
        }

        writer
            .flush()
            .map_err(|e| CoverGameError::io("flushing output", e))?;
        pb.finish_with_message(format!(
            "Done! {} solved, {} skipped",
            stats.total_solved, stats.total_failed
        ));

        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();
        self.log_complete(&stats);

        Ok(stats)
    }

    /// Run the pipeline with optional checkpoint support.
    ///
    /// Checkpointed runs append JSON Lines; games already recorded in the
    /// checkpoint are not regenerated.
    pub async fn run_with_checkpoint(
        &self,
        output_path: &Path,
        checkpoint: Option<CheckpointManager>,
    ) -> Result<RunStats> {
        let mut checkpoint = match checkpoint {
            Some(c) => c,
            None => return self.run(output_path).await,
        };

        if self.config.output.format != OutputFormat::Jsonl {
            return Err(CoverGameError::InvalidInput(
                "checkpointed runs require jsonl output".to_string(),
            ));
        }

        let start = Instant::now();

        let (seed, total) = {
            let state = checkpoint.init_or_load(self.seed, self.config.generation.num_games)?;
            (state.seed, state.total_games)
        };

        if let Some(ops) = Transaction::recover(checkpoint.dir(), output_path)? {
            checkpoint.requeue(ops.iter().map(PendingOperation::index))?;
            warn!(count = ops.len(), "Requeued games from an unfinished transaction");
        }

        let pending = checkpoint.pending_indices();
        if pending.is_empty() {
            info!("All games already processed, nothing to do");
            return checkpoint
                .state()
                .map(|state| state.to_run_stats(0.0))
                .ok_or_else(|| CoverGameError::Internal("Checkpoint state missing".to_string()));
        }

        let already_done = total - pending.len();
        info!(
            total_games = total,
            pending = pending.len(),
            already_done,
            workers = self.pool.pool_size(),
            seed,
            "Resuming generation pipeline"
        );

        let pb = Self::progress_bar(total)?;
        pb.set_position(already_done as u64);

        Self::create_parent_dir(output_path)?;
        // Make sure the output exists even if every pending game is skipped.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .map_err(|e| CoverGameError::io("opening output file", e))?;

        let mut solved_count = 0;
        let mut skipped_count = 0;

        for batch in pending.chunks(self.batch_size()) {
            let jobs = self.jobs(seed, batch);
            let (solved, failed) = self.pool.solve_batch(jobs).await?;

            let mut tx = Transaction::begin(checkpoint.dir(), output_path);
            for game in &solved {
                tx.record_solved(
                    game.index,
                    game.solution.best_score,
                    game.solution.allocations.len(),
                    game.solution.profiles_evaluated,
                    Self::to_json_line(game)?,
                );
            }
            for (index, error) in &failed {
                let reason = match error {
                    CoverGameError::ProfileLimitExceeded { .. } => FailureReason::TooManyProfiles,
                    _ => FailureReason::TaskFailed,
                };
                tx.record_failed(*index, reason);
            }

            let committed = tx.commit()?;
            for op in &committed.operations {
                match op {
                    PendingOperation::Solved { .. } => solved_count += 1,
                    PendingOperation::Failed { .. } => skipped_count += 1,
                }
            }
            checkpoint.record_batch(&committed.operations)?;
            committed.finish()?;

            pb.inc(batch.len() as u64);
            pb.set_message(format!(
                "solved: {solved_count}, skipped: {skipped_count}"
            ));
        }

        pb.finish_with_message(format!(
            "Done! {solved_count} solved, {skipped_count} skipped"
        ));

        let runtime = start.elapsed().as_secs_f64();
        let stats = checkpoint
            .state()
            .map(|state| state.to_run_stats(runtime))
            .ok_or_else(|| CoverGameError::Internal("Checkpoint state missing".to_string()))?;
        self.log_complete(&stats);

        Ok(stats)
    }

    fn log_complete(&self, stats: &RunStats) {
        if !self.config.output.track_stats {
            info!(solved = stats.total_solved, "Generation pipeline complete");
            return;
        }
        info!(
            solved = stats.total_solved,
            skipped = stats.total_failed,
            profiles = stats.profiles_evaluated,
            mean_optimal = format!("{:.2}", stats.mean_optimal),
            throughput = format!("{:.0}/hr", stats.throughput_per_hour),
            "Generation pipeline complete"
        );
    }
}
