//! Pipeline module - batch generation of solved games.

mod generate;

pub use generate::*;
