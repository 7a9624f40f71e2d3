//! Command-line parsing for the `screener` binary.
//!
//! Argument parsing stays here; turning arguments into a `FilterSpec` and
//! dispatching is `app`'s job.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Recipe, ScreenerPreset, SortOrder, Threshold};
use crate::report::OutputFormat;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "screener", version, about = "Finviz stock screener query compiler and client")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// API token; overrides FINVIZ_API_KEY.
    #[arg(long, global = true)]
    pub auth: Option<String>,

    /// Fail on filter values that cannot be encoded instead of dropping them.
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a screen built from a preset, a filters file and/or flags.
    Screen(ScreenArgs),
    /// Fetch fundamentals for one or more tickers.
    Quote(QuoteArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ScreenArgs {
    /// Start from a named screen; flags given alongside override its values.
    #[arg(long, value_enum, conflicts_with = "filters")]
    pub preset: Option<ScreenerPreset>,

    /// JSON file holding a filter spec; flags override its values.
    #[arg(long, value_name = "JSON")]
    pub filters: Option<PathBuf>,

    /// Market-cap bucket (`mega`, `smallover`, ...) or range (`10to200`).
    #[arg(long)]
    pub market_cap: Option<String>,

    /// Price floor: number or provider shorthand (`o5`).
    #[arg(long, value_parser = parse_threshold)]
    pub price_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub price_max: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub volume_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub volume_max: Option<Threshold>,

    /// Average volume in shares.
    #[arg(long, value_parser = parse_threshold)]
    pub avg_volume_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub avg_volume_max: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub relative_volume_min: Option<Threshold>,

    /// Daily change floor in percent.
    #[arg(long, value_parser = parse_threshold, allow_hyphen_values = true)]
    pub change_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold, allow_hyphen_values = true)]
    pub change_max: Option<Threshold>,

    /// After-hours change floor in percent.
    #[arg(long, allow_hyphen_values = true)]
    pub afterhours_change_min: Option<f64>,

    /// Within N percent of the 52-week high.
    #[arg(long)]
    pub near_52w_high: Option<f64>,

    #[arg(long, value_parser = parse_threshold)]
    pub rsi_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub rsi_max: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub pe_min: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub pe_max: Option<Threshold>,

    #[arg(long, value_parser = parse_threshold)]
    pub dividend_yield_min: Option<Threshold>,

    /// Sector name or code; repeat or comma-separate for several.
    #[arg(long = "sector", value_delimiter = ',')]
    pub sectors: Vec<String>,

    /// Earnings keyword (`today_after`, `this_week`, ...); repeat for an OR-list.
    #[arg(long = "earnings-date")]
    pub earnings_dates: Vec<String>,

    /// Start of an earnings-date range (with --earnings-to).
    #[arg(long, requires = "earnings_to", conflicts_with = "earnings_dates")]
    pub earnings_from: Option<String>,

    #[arg(long, requires = "earnings_from")]
    pub earnings_to: Option<String>,

    #[arg(long)]
    pub sma20_above: bool,

    #[arg(long)]
    pub sma50_above: bool,

    #[arg(long)]
    pub sma200_above: bool,

    #[arg(long)]
    pub stocks_only: bool,

    /// Force a fixed-order recipe.
    #[arg(long, value_enum)]
    pub recipe: Option<Recipe>,

    #[arg(long)]
    pub sort_by: Option<String>,

    #[arg(long, value_enum)]
    pub sort_order: Option<SortOrder>,

    /// Result cap (clamped to 1000; 0 means no cap).
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Print the compiled request instead of sending it.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct QuoteArgs {
    /// Ticker symbols.
    #[arg(required = true, value_delimiter = ',')]
    pub tickers: Vec<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Fields to keep, comma-separated (canonical names or aliases).
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Also write the records to a file (`.json` for JSON, CSV otherwise).
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

impl OutputArgs {
    pub fn fields(&self) -> Option<&[String]> {
        (!self.fields.is_empty()).then_some(self.fields.as_slice())
    }
}

/// Plain numbers become values; anything else is passed on as provider shorthand.
pub fn parse_threshold(raw: &str) -> Result<Threshold, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("threshold must not be empty".to_string());
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Threshold::Value(v)),
        Ok(_) => Err(format!("threshold must be finite: {raw}")),
        Err(_) => Ok(Threshold::Preset(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_parse_numbers_and_presets() {
        assert_eq!(parse_threshold("10"), Ok(Threshold::Value(10.0)));
        assert_eq!(parse_threshold(" 1.5 "), Ok(Threshold::Value(1.5)));
        assert_eq!(parse_threshold("o5"), Ok(Threshold::Preset("o5".into())));
        assert!(parse_threshold("").is_err());
        assert!(parse_threshold("inf").is_err());
    }

    #[test]
    fn screen_flags_parse() {
        let cli = Cli::parse_from([
            "screener",
            "-vv",
            "screen",
            "--market-cap",
            "smallover",
            "--price-min",
            "10",
            "--change-min",
            "-2",
            "--sector",
            "Technology,Energy",
            "--earnings-date",
            "today_after",
            "--stocks-only",
            "--fields",
            "price,volume",
            "-o",
            "json",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Screen(args) = cli.command else {
            panic!("expected screen");
        };
        assert_eq!(args.market_cap.as_deref(), Some("smallover"));
        assert_eq!(args.price_min, Some(Threshold::Value(10.0)));
        assert_eq!(args.change_min, Some(Threshold::Value(-2.0)));
        assert_eq!(args.sectors, vec!["Technology", "Energy"]);
        assert!(args.stocks_only);
        assert_eq!(args.output.output, OutputFormat::Json);
        assert_eq!(args.output.fields().map(<[String]>::len), Some(2));
    }

    #[test]
    fn earnings_range_needs_both_ends() {
        let err = Cli::try_parse_from(["screener", "screen", "--earnings-from", "2025-06-30"]);
        assert!(err.is_err());
    }

    #[test]
    fn quote_accepts_lists() {
        let cli = Cli::parse_from(["screener", "--auth", "t", "quote", "AAPL,MSFT", "NVDA"]);
        assert_eq!(cli.auth.as_deref(), Some("t"));
        let Command::Quote(args) = cli.command else {
            panic!("expected quote");
        };
        assert_eq!(args.tickers, vec!["AAPL", "MSFT", "NVDA"]);
        assert!(args.output.fields().is_none());
    }
}
