//! Pool module - bounded parallel solving.

mod solver;

pub use solver::*;
