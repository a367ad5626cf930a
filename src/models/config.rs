//! Configuration models for covergame.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file or CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for covergame.
///
/// I^R resolved: All configurable parameters are explicit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Shape of each generated game
    #[serde(default)]
    pub game: GameConfig,

    /// Batch generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Shape of a generated game instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of resources (R0, R1, ...)
    #[serde(default = "default_num_resources")]
    pub num_resources: usize,

    /// Number of agents (P0, P1, ...)
    #[serde(default = "default_num_agents")]
    pub num_agents: usize,

    /// Number of action entries left after trimming
    #[serde(default = "default_actions_to_keep")]
    pub actions_to_keep: usize,

    /// Explicit number of action entries to remove (overrides actions_to_keep)
    #[serde(default)]
    pub actions_to_remove: Option<usize>,
}

fn default_num_resources() -> usize {
    6
}

fn default_num_agents() -> usize {
    4
}

fn default_actions_to_keep() -> usize {
    10
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            num_resources: default_num_resources(),
            num_agents: default_num_agents(),
            actions_to_keep: default_actions_to_keep(),
            actions_to_remove: None,
        }
    }
}

impl GameConfig {
    /// Number of action entries the generator removes from a full game.
    pub fn removal_count(&self) -> usize {
        self.actions_to_remove.unwrap_or_else(|| {
            self.num_agents
                .saturating_mul(self.num_resources)
                .saturating_sub(self.actions_to_keep)
        })
    }
}

/// Batch generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Number of games per run
    #[serde(default = "default_num_games")]
    pub num_games: usize,

    /// Base seed; game i uses seed + i. Drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Maximum number of concurrent searches
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Games whose action profile count exceeds this are skipped
    #[serde(default = "default_max_profiles")]
    pub max_profiles: u64,
}

fn default_num_games() -> usize {
    10
}

fn default_workers() -> usize {
    4
}

fn default_max_profiles() -> u64 {
    10_000_000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_games: default_num_games(),
            seed: None,
            workers: default_workers(),
            max_profiles: default_max_profiles(),
        }
    }
}

/// Serialization format of the output file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One game document per line (default, supports checkpoints)
    #[default]
    Jsonl,
    /// Single `{"games": [...]}` document
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output file path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Checkpoint directory for resume support
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Whether to log per-run search statistics
    #[serde(default = "default_true")]
    pub track_stats: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("output/games.jsonl")
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
            checkpoint_dir: None,
            track_stats: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file if it exists, otherwise fall back to defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check the parameters that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.num_agents == 0 {
            return Err(ConfigError::Invalid("game.num_agents must be positive".into()));
        }
        if self.game.num_resources == 0 {
            return Err(ConfigError::Invalid(
                "game.num_resources must be positive".into(),
            ));
        }
        if self
            .game
            .num_agents
            .checked_mul(self.game.num_resources)
            .is_none()
        {
            return Err(ConfigError::Invalid(
                "game.num_agents * game.num_resources overflows".into(),
            ));
        }
        if self.generation.num_games == 0 {
            return Err(ConfigError::Invalid(
                "generation.num_games must be positive".into(),
            ));
        }
        if self.generation.workers == 0 {
            return Err(ConfigError::Invalid(
                "generation.workers must be positive".into(),
            ));
        }
        if self.generation.max_profiles == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_profiles must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error
/// - I^B materialized: Values that cannot describe a game
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
