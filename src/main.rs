//! covergame CLI - Generate resource allocation games with optimal allocations.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use covergame::models::OutputFormat;
use covergame::{CheckpointManager, Config, GeneratePipeline};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "covergame")]
#[command(version)]
#[command(about = "Generate resource allocation games labelled with every welfare-optimal allocation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "covergame.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a batch of solved games
    Generate {
        /// Number of games (overrides config)
        #[arg(short, long)]
        games: Option<usize>,

        /// Base seed (overrides config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output file (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Checkpoint directory for resumable runs
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Solve a single game document and print it with its optimal allocations
    Solve {
        /// Path to a game JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# covergame configuration file

[game]
num_resources = 6
num_agents = 4
# Action entries left per game after random trimming
actions_to_keep = 10
# actions_to_remove = 14  # overrides actions_to_keep

[generation]
num_games = 10
# seed = 42               # omit to draw one from OS entropy
workers = 4
# Games with more action profiles than this are skipped
max_profiles = 10000000

[output]
path = "output/games.jsonl"
format = "jsonl"          # or "json" for a single {"games": [...]} document
# checkpoint_dir = "checkpoints/"
track_stats = true
"#;
    println!("{example}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            info!("Configuration is valid");
            info!(
                "  Game: {} agents, {} resources, {} actions removed",
                config.game.num_agents,
                config.game.num_resources,
                config.game.removal_count()
            );
            info!(
                "  Generation: {} games, {} workers",
                config.generation.num_games, config.generation.workers
            );
            return Ok(());
        }

        Commands::Solve { input, pretty } => {
            let config = Config::from_file_or_default(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let record = GeneratePipeline::solve_document(&input, config.generation.max_profiles)
                .with_context(|| format!("Failed to solve {input:?}"))?;
            let json = if pretty {
                serde_json::to_string_pretty(&record)?
            } else {
                serde_json::to_string(&record)?
            };
            println!("{json}");
        }

        Commands::Generate {
            games,
            seed,
            output,
            format,
            checkpoint,
        } => {
            let mut config = Config::from_file_or_default(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            // CLI overrides
            if let Some(games) = games {
                config.generation.num_games = games;
            }
            if seed.is_some() {
                config.generation.seed = seed;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            let output = output.unwrap_or_else(|| config.output.path.clone());
            let checkpoint = checkpoint.or_else(|| config.output.checkpoint_dir.clone());

            let pipeline = GeneratePipeline::new(config)?;

            let checkpoint_mgr = match checkpoint {
                Some(dir) => Some(
                    CheckpointManager::new(&dir).context("Failed to create checkpoint manager")?,
                ),
                None => None,
            };

            let stats = pipeline
                .run_with_checkpoint(&output, checkpoint_mgr)
                .await?;

            println!("\n=== Game Generation Complete ===");
            println!("Games:       {}", stats.total_games);
            println!("Solved:      {}", stats.total_solved);
            println!("Skipped:     {}", stats.total_failed);
            println!("Profiles:    {}", stats.profiles_evaluated);
            println!("Optimal:     {} ({:.2}/game)", stats.optimal_allocations, stats.mean_optimal);
            println!("Throughput:  {:.0}/hr", stats.throughput_per_hour);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("Output:      {output:?}");
        }
    }

    Ok(())
}
