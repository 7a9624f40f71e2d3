//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the caller-facing screening input (`FilterSpec`, `Threshold`, `EarningsDate`)
//! - recipe ids and named screener presets (`Recipe`, `ScreenerPreset`)
//! - the typed output (`FieldValue`, `StockRecord`)

pub mod filter;
pub mod record;

pub use filter::*;
pub use record::*;
