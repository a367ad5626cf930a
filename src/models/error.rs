//! Error types for covergame.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad config, malformed game documents)
//! - I^B materialized: Infrastructure failures (filesystem, blocking tasks)
//! - K_i violated: Internal invariant violations (bugs)
//!
//! The search itself is infallible; everything here belongs to the layers
//! around it.

use thiserror::Error;

/// Top-level error type for covergame.
#[derive(Debug, Error)]
pub enum CoverGameError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent '{agent}' references unknown resource '{resource}'")]
    UnknownResource { agent: String, resource: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Game {game} has {profiles} action profiles, limit is {limit}")]
    ProfileLimitExceeded {
        game: usize,
        profiles: u128,
        limit: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Solver task failed: {0}")]
    TaskFailed(String),

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoverGameError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the failure concerns a single game rather than the whole run.
    ///
    /// The pipeline records these as failed games and keeps going.
    pub fn is_per_game(&self) -> bool {
        matches!(
            self,
            Self::ProfileLimitExceeded { .. } | Self::TaskFailed(_)
        )
    }
}

/// Result type alias for covergame.
pub type Result<T> = std::result::Result<T, CoverGameError>;
