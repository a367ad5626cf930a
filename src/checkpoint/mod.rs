//! Checkpoint module for resumable generation runs.
//!
//! Provides:
//! - `CheckpointState`: Status of every game index in a run
//! - `CheckpointManager`: Persistence and loading of checkpoint state
//! - `Transaction`: Atomic batch output with crash recovery

mod state;
mod transaction;

pub use state::*;
pub use transaction::*;
