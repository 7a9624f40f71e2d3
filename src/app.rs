//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - resolves configuration (flags over environment over defaults)
//! - builds a `FilterSpec` and runs the screen or quote
//! - prints and optionally exports the records

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, QuoteArgs, ScreenArgs};
use crate::data::{ClientConfig, ScreenerClient};
use crate::error::Result;
use crate::query::EncodeMode;

pub mod pipeline;

/// Entry point for the `screener` binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mode = if cli.strict {
        EncodeMode::Strict
    } else {
        EncodeMode::Lenient
    };
    let config = ClientConfig::from_env()
        .with_auth_token(cli.auth.clone())
        .with_encode_mode(mode);
    debug!(?config, "resolved configuration");

    match cli.command {
        Command::Screen(args) => handle_screen(config, args),
        Command::Quote(args) => handle_quote(config, args),
    }
}

/// `RUST_LOG` wins; otherwise `-v` picks the level. Logs go to stderr.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_screen(config: ClientConfig, args: ScreenArgs) -> Result<()> {
    let spec = pipeline::spec_from_args(&args)?;
    let client = ScreenerClient::new(config)?;

    if args.dry_run {
        println!("{}", pipeline::describe_query(&client, &spec)?);
        return Ok(());
    }

    let records = pipeline::run_screen(&client, &spec, args.output.fields())?;
    pipeline::emit(&records, &args.output)
}

fn handle_quote(config: ClientConfig, args: QuoteArgs) -> Result<()> {
    let client = ScreenerClient::new(config)?;
    let records = client.stocks(&args.tickers, args.output.fields())?;
    pipeline::emit(&records, &args.output)
}
