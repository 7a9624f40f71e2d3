//! Record assembler: parsed rows -> `StockRecord`s.

use tracing::{debug, warn};

use super::fields::{canonical_key, field_for_column, normalize_field, resolve_field};
use super::table::{RawRow, Table};
use crate::domain::{FieldValue, StockRecord};

/// `above_sma_*` flags derived from the SMA-relative percentage columns.
const SMA_FLAGS: [(&str, &str); 3] = [
    ("sma_20", "above_sma_20"),
    ("sma_50", "above_sma_50"),
    ("sma_200", "above_sma_200"),
];

/// Builds one record from a row.
///
/// `fallback_ticker` is used when the row carries no ticker of its own. A row
/// with neither yields `None`.
pub fn record_from_row(row: RawRow<'_>, fallback_ticker: Option<&str>) -> Option<StockRecord> {
    let mut ticker: Option<String> = None;
    let mut fields: Vec<(String, FieldValue)> = Vec::new();

    for (label, cell) in row.pairs() {
        let key = canonical_key(label);
        // `No.` is the provider's row counter.
        if key.is_empty() || key == "no" {
            continue;
        }
        let name = field_for_column(&key).map(str::to_string).unwrap_or(key);
        let value = normalize_field(&name, cell);

        if name == "ticker" {
            ticker = value.as_str().map(str::to_string);
            continue;
        }
        if fields.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        fields.push((name, value));
    }

    for (source, flag) in SMA_FLAGS {
        let above = fields
            .iter()
            .find(|(name, _)| name == source)
            .and_then(|(_, value)| value.as_f64())
            .map(|pct| pct > 0.0);
        if let Some(above) = above {
            if !fields.iter().any(|(name, _)| name == flag) {
                fields.push((flag.to_string(), FieldValue::Bool(above)));
            }
        }
    }

    let ticker = ticker.or_else(|| fallback_ticker.map(str::to_string))?;
    Some(StockRecord::new(ticker, fields))
}

/// Builds records for every row in a table.
///
/// When `requested` is given, row `i` without a ticker column is attributed
/// to `requested[i]`.
pub fn records_from_table(table: &Table, requested: Option<&[String]>) -> Vec<StockRecord> {
    let mut records = Vec::with_capacity(table.len());
    for (idx, row) in table.iter().enumerate() {
        let fallback = requested.and_then(|tickers| tickers.get(idx)).map(String::as_str);
        match record_from_row(row, fallback) {
            Some(record) => records.push(record),
            None => warn!(row = idx + 1, "row has no ticker; skipping"),
        }
    }
    debug!(rows = table.len(), records = records.len(), "assembled records");
    records
}

/// Projects a record onto caller-requested field names.
///
/// Output fields are keyed by the names as requested, in request order;
/// names that do not resolve come back as null.
pub fn project(record: &StockRecord, requested: &[String]) -> StockRecord {
    let fields = requested
        .iter()
        .map(|name| {
            let value = resolve_field(record, name)
                .map(|found| found.value.clone())
                .unwrap_or(FieldValue::Null);
            (name.clone(), value)
        })
        .collect();
    StockRecord::new(record.ticker(), fields)
}
