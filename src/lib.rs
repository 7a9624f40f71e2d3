//! `finviz-screener` library crate.
//!
//! Compiles abstract screening criteria into Finviz export queries, fetches
//! them with rate limiting and retries, and normalizes the CSV answer into
//! typed records. The binary (`screener`) is a thin wrapper around this
//! library so the whole pipeline stays testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod query;
pub mod report;
