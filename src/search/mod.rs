//! Exhaustive welfare-optimal search.
//!
//! - `ProfileEnumerator`: mixed-radix odometer over per-agent choices
//! - `evaluate`: union value of one profile
//! - `OptimumTracker`: running maximum and every profile that reaches it
//!
//! K_i: The search is a pure function of one `Instance`; it never fails.

mod enumerator;
mod payoff;
mod tracker;

pub use enumerator::*;
pub use payoff::*;
pub use tracker::*;
