//! Screening query compiler.
//!
//! Turns a `FilterSpec` into the provider's query grammar:
//!
//! - `encode`: numeric rendering and the generic threshold/range encoder
//! - `presets`: market-cap buckets, sectors, earnings dates, the volume ladder
//! - `recipe`: fixed-order token recipes and their priority table
//! - `assemble`: recipe head + generic tail, sort/cap/columns, `QueryParameters`

use std::fmt;

use thiserror::Error;
use tracing::warn;

pub mod assemble;
pub mod encode;
pub mod presets;
pub mod recipe;

pub use assemble::*;
pub use encode::*;
pub use presets::*;
pub use recipe::*;

/// A value that could not be turned into a token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("unknown market cap '{0}'")]
    UnknownMarketCap(String),

    #[error("unknown sector '{0}'")]
    UnknownSector(String),

    #[error("unknown earnings date keyword '{0}'")]
    UnknownEarningsKeyword(String),

    #[error("unrecognized date '{0}'")]
    InvalidDate(String),

    #[error("malformed preset '{0}'")]
    MalformedPreset(String),

    #[error("non-finite threshold {0}")]
    NonFinite(f64),

    #[error("unknown performance range '{0}'")]
    UnknownPerformanceRange(String),
}

/// How the compiler treats values it cannot encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeMode {
    /// Drop the offending value and log a warning.
    #[default]
    Lenient,
    /// Fail compilation with the first encode error.
    Strict,
}

impl EncodeMode {
    /// Applies the mode to one encoder outcome.
    pub fn settle<T>(
        self,
        dimension: &str,
        outcome: Result<Option<T>, EncodeError>,
    ) -> Result<Option<T>, EncodeError> {
        match outcome {
            Err(err) if self == EncodeMode::Lenient => {
                warn!(dimension, error = %err, "dropping filter value");
                Ok(None)
            }
            other => other,
        }
    }
}

/// One `<prefix>_<value>` atom of the filter string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn new(prefix: &str, value: &str) -> Self {
        Token(format!("{prefix}_{value}"))
    }

    /// A token whose full text is already known (`ind_stocksonly`).
    pub fn literal(text: &str) -> Self {
        Token(text.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_mode_swallows_errors() {
        let outcome: Result<Option<Token>, _> = Err(EncodeError::UnknownSector("Crypto".into()));
        assert_eq!(EncodeMode::Lenient.settle("sector", outcome), Ok(None));
    }

    #[test]
    fn strict_mode_keeps_errors() {
        let outcome: Result<Option<Token>, _> = Err(EncodeError::UnknownSector("Crypto".into()));
        assert_eq!(
            EncodeMode::Strict.settle("sector", outcome),
            Err(EncodeError::UnknownSector("Crypto".into()))
        );
    }

    #[test]
    fn token_joins_prefix_and_value() {
        assert_eq!(Token::new("sh_price", "o10").to_string(), "sh_price_o10");
        assert_eq!(Token::literal("ta_sma200_pa").as_str(), "ta_sma200_pa");
    }
}
