//! Generator module - random game instances.

mod randomize;

pub use randomize::*;
