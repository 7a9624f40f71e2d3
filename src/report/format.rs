//! Rendering of record lists for the terminal and for export files.
//!
//! Formatting lives here so the client and the normalizer never care about
//! presentation.

use std::fs::File;
use std::path::Path;

use clap::ValueEnum;

use crate::domain::{FieldValue, StockRecord};
use crate::error::Result;

/// Columns shown in the text table when the caller names none.
pub const DEFAULT_TABLE_COLUMNS: [&str; 6] = [
    "company_name",
    "sector",
    "price",
    "price_change",
    "volume",
    "market_cap",
];

const TICKER_WIDTH: usize = 8;
const COLUMN_WIDTH: usize = 14;
const TEXT_COLUMN_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

pub fn render(records: &[StockRecord], columns: Option<&[String]>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_table(records, columns)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            write_csv(&mut writer, records, columns)?;
            let bytes = writer
                .into_inner()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Writes records to `path`; JSON when the extension is `.json`, CSV otherwise.
pub fn write_export(path: &Path, records: &[StockRecord], columns: Option<&[String]>) -> Result<()> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let file = File::create(path)?;
    if is_json {
        serde_json::to_writer_pretty(file, records)?;
    } else {
        let mut writer = csv::Writer::from_writer(file);
        write_csv(&mut writer, records, columns)?;
    }
    Ok(())
}

/// Requested columns, else the union of field names in first-seen order.
fn export_columns(records: &[StockRecord], columns: Option<&[String]>) -> Vec<String> {
    if let Some(columns) = columns.filter(|c| !c.is_empty()) {
        return columns.to_vec();
    }
    let mut out: Vec<String> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !out.iter().any(|existing| existing == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

fn write_csv<W: std::io::Write>(
    writer: &mut csv::Writer<W>,
    records: &[StockRecord],
    columns: Option<&[String]>,
) -> Result<()> {
    let columns = export_columns(records, columns);

    let mut header = vec!["ticker".to_string()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.ticker().to_string()];
        row.extend(columns.iter().map(|name| csv_cell(record.get(name))));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_cell(value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Null) => String::new(),
        Some(v) => v.to_string(),
    }
}

pub fn format_table(records: &[StockRecord], columns: Option<&[String]>) -> String {
    let columns: Vec<String> = match columns.filter(|c| !c.is_empty()) {
        Some(columns) => columns.to_vec(),
        None => DEFAULT_TABLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
    };
    let widths: Vec<usize> = columns.iter().map(|c| column_width(c)).collect();

    let mut out = String::new();
    let mut line = format!("{:<TICKER_WIDTH$}", "ticker");
    for (name, &width) in columns.iter().zip(&widths) {
        line.push_str(&format!(" {:<width$}", truncate(name, width)));
    }
    out.push_str(line.trim_end());
    out.push('\n');

    let mut rule = format!("{:-<TICKER_WIDTH$}", "");
    for &width in &widths {
        rule.push_str(&format!(" {:-<width$}", ""));
    }
    out.push_str(&rule);
    out.push('\n');

    for record in records {
        let mut line = format!("{:<TICKER_WIDTH$}", truncate(record.ticker(), TICKER_WIDTH));
        for (name, &width) in columns.iter().zip(&widths) {
            let value = record.get(name);
            let cell = truncate(&fmt_cell(name, value), width);
            match value {
                Some(FieldValue::Int(_)) | Some(FieldValue::Float(_)) => {
                    line.push_str(&format!(" {cell:>width$}"))
                }
                _ => line.push_str(&format!(" {cell:<width$}")),
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&format!("\n{} record(s)\n", records.len()));
    out
}

fn column_width(name: &str) -> usize {
    match name {
        "company_name" | "industry" | "sector" => TEXT_COLUMN_WIDTH,
        _ => COLUMN_WIDTH.max(name.chars().count().min(TEXT_COLUMN_WIDTH)),
    }
}

fn fmt_cell(name: &str, value: Option<&FieldValue>) -> String {
    match value {
        None | Some(FieldValue::Null) => "-".to_string(),
        Some(FieldValue::Float(v)) if name.contains("change") || name.starts_with("performance") => {
            format!("{v:.2}%")
        }
        Some(FieldValue::Float(v)) if v.abs() >= 1e6 => fmt_compact(*v),
        Some(FieldValue::Int(v)) if (*v as f64).abs() >= 1e6 => fmt_compact(*v as f64),
        Some(FieldValue::Float(v)) => format!("{v:.2}"),
        Some(other) => other.to_string(),
    }
}

/// `1.23B`, `45.60M`
fn fmt_compact(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e12 {
        format!("{:.2}T", v / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else {
        format!("{:.2}M", v / 1e6)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<StockRecord> {
        vec![
            StockRecord::new(
                "AAPL",
                vec![
                    ("company_name".into(), FieldValue::Text("Apple Inc.".into())),
                    ("price".into(), FieldValue::Float(189.5)),
                    ("price_change".into(), FieldValue::Float(1.2)),
                    ("volume".into(), FieldValue::Int(51_234_100)),
                    ("market_cap".into(), FieldValue::Float(3.0005e12)),
                ],
            ),
            StockRecord::placeholder("MSFT"),
        ]
    }

    #[test]
    fn table_has_header_rule_rows_and_count() {
        let out = format_table(&records(), None);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("ticker   company_name"));
        assert!(lines[1].starts_with("--------"));
        assert!(lines[2].starts_with("AAPL     Apple Inc."));
        assert!(lines[2].contains("1.20%"));
        assert!(lines[2].contains("51.23M"));
        assert!(lines[2].contains("3.00T"));
        assert!(lines[3].starts_with("MSFT"));
        assert!(out.ends_with("2 record(s)\n"));
        assert!(lines.iter().all(|l| !l.ends_with(' ')));
    }

    #[test]
    fn table_uses_requested_columns() {
        let columns = vec!["price".to_string()];
        let out = format_table(&records(), Some(columns.as_slice()));
        let header = out.lines().next().unwrap();
        assert_eq!(header, "ticker   price");
    }

    #[test]
    fn csv_has_ticker_first_and_blank_nulls() {
        let columns = vec!["price".to_string(), "roe".to_string()];
        let out = render(&records(), Some(columns.as_slice()), OutputFormat::Csv).unwrap();
        assert_eq!(out, "ticker,price,roe\nAAPL,189.5,\nMSFT,,\n");
    }

    #[test]
    fn json_is_an_array_of_objects() {
        let out = render(&records(), None, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["ticker"], "AAPL");
        assert_eq!(value[0]["volume"], 51_234_100);
        assert_eq!(value[1], serde_json::json!({ "ticker": "MSFT" }));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("Microsoft Corporation", 10), "Microsoft.");
        assert_eq!(truncate("AAPL", 10), "AAPL");
    }
}
