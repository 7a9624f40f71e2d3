//! Shared screen/quote workflow used by the binary.
//!
//! args -> FilterSpec -> compiled query -> records -> rendered output

use std::fs;

use crate::cli::{OutputArgs, ScreenArgs};
use crate::data::{ScreenerClient, Transport};
use crate::domain::{EarningsDate, FilterSpec, StockRecord};
use crate::error::{Result, ScreenerError};
use crate::io::project;
use crate::report::{render, write_export};

/// Builds the spec: preset or filters file first, then explicit flags on top.
pub fn spec_from_args(args: &ScreenArgs) -> Result<FilterSpec> {
    let mut spec = match (&args.preset, &args.filters) {
        (Some(preset), _) => FilterSpec::preset(*preset),
        (None, Some(path)) => {
            let text = fs::read_to_string(path).map_err(|e| {
                ScreenerError::config(format!("Failed to read filters file '{}': {e}", path.display()))
            })?;
            serde_json::from_str(&text)?
        }
        (None, None) => FilterSpec::default(),
    };

    if let Some(cap) = &args.market_cap {
        spec.market_cap = Some(cap.clone());
    }
    overlay(&mut spec.price_min, &args.price_min);
    overlay(&mut spec.price_max, &args.price_max);
    overlay(&mut spec.volume_min, &args.volume_min);
    overlay(&mut spec.volume_max, &args.volume_max);
    overlay(&mut spec.avg_volume_min, &args.avg_volume_min);
    overlay(&mut spec.avg_volume_max, &args.avg_volume_max);
    overlay(&mut spec.relative_volume_min, &args.relative_volume_min);
    overlay(&mut spec.price_change_min, &args.change_min);
    overlay(&mut spec.price_change_max, &args.change_max);
    overlay(&mut spec.afterhours_change_min, &args.afterhours_change_min);
    overlay(&mut spec.near_52w_high, &args.near_52w_high);
    overlay(&mut spec.rsi_min, &args.rsi_min);
    overlay(&mut spec.rsi_max, &args.rsi_max);
    overlay(&mut spec.pe_min, &args.pe_min);
    overlay(&mut spec.pe_max, &args.pe_max);
    overlay(&mut spec.dividend_yield_min, &args.dividend_yield_min);
    overlay(&mut spec.recipe_hint, &args.recipe);
    overlay(&mut spec.sort_by, &args.sort_by);
    overlay(&mut spec.max_results, &args.max_results);
    if let Some(order) = args.sort_order {
        spec.sort_order = order;
    }

    if !args.sectors.is_empty() {
        spec.sectors = args.sectors.clone();
    }
    if let (Some(start), Some(end)) = (&args.earnings_from, &args.earnings_to) {
        spec.earnings_date = Some(EarningsDate::range(start.clone(), end.clone()));
    } else {
        match args.earnings_dates.as_slice() {
            [] => {}
            [single] => spec.earnings_date = Some(EarningsDate::keyword(single.clone())),
            many => spec.earnings_date = Some(EarningsDate::Keywords(many.to_vec())),
        }
    }

    spec.sma20_above |= args.sma20_above;
    spec.sma50_above |= args.sma50_above;
    spec.sma200_above |= args.sma200_above;
    spec.stocks_only |= args.stocks_only;

    Ok(spec)
}

fn overlay<T: Clone>(slot: &mut Option<T>, flag: &Option<T>) {
    if let Some(value) = flag {
        *slot = Some(value.clone());
    }
}

/// Compiled request as text: recipe line, then the URL with auth masked.
pub fn describe_query<T: Transport>(client: &ScreenerClient<T>, spec: &FilterSpec) -> Result<String> {
    let query = client.compile(spec)?;
    let url = reqwest::Url::parse_with_params(&client.config().export_url(), query.params.redacted_pairs())
        .map_err(|e| ScreenerError::config(format!("Invalid base URL: {e}")))?;

    let recipe = query.recipe.map(|r| r.name()).unwrap_or("generic");
    let mut out = String::new();
    out.push_str(&format!("recipe: {recipe}\n"));
    out.push_str(&format!("filter: {}\n", query.params.filter.as_deref().unwrap_or("")));
    out.push_str(&format!("url: {url}"));
    Ok(out)
}

pub fn run_screen<T: Transport>(
    client: &ScreenerClient<T>,
    spec: &FilterSpec,
    fields: Option<&[String]>,
) -> Result<Vec<StockRecord>> {
    let records = client.screen(spec)?;
    Ok(match fields {
        Some(requested) => records.iter().map(|r| project(r, requested)).collect(),
        None => records,
    })
}

/// Prints records to stdout and writes the optional export file.
pub fn emit(records: &[StockRecord], output: &OutputArgs) -> Result<()> {
    print!("{}", render(records, output.fields(), output.output)?);
    if let Some(path) = &output.export {
        write_export(path, records, output.fields())?;
        eprintln!("Exported {} record(s) to {}", records.len(), path.display());
    }
    Ok(())
}
