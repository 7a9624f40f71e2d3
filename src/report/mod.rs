//! Output rendering for the `screener` binary.

pub mod format;

pub use format::*;
