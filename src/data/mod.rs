//! Provider access.
//!
//! - configuration (`config`)
//! - HTTP with rate limiting and retries (`transport`)
//! - screen / quote orchestration (`client`)

pub mod client;
pub mod config;
pub mod transport;

pub use client::*;
pub use config::*;
pub use transport::*;
