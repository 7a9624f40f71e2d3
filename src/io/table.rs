//! Row parser for the provider's CSV export.
//!
//! Turns a response body into one header row plus data rows. Rows that do
//! not parse, or whose width does not match the header, are skipped and
//! reported rather than failing the whole response.

use csv::StringRecord;
use tracing::{debug, warn};

use crate::error::Result;

/// A row-level problem encountered while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed response: header labels and raw cells, one `Vec` per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_errors: Vec<RowError>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows paired with the shared header.
    pub fn iter(&self) -> impl Iterator<Item = RawRow<'_>> {
        self.rows.iter().map(|cells| RawRow {
            headers: &self.headers,
            cells,
        })
    }

    /// Drops rows past `cap`.
    pub fn truncate(&mut self, cap: usize) {
        if self.rows.len() > cap {
            debug!(rows = self.rows.len(), cap, "truncating rows to result cap");
            self.rows.truncate(cap);
        }
    }
}

/// One data row viewed against the header.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> RawRow<'a> {
    /// `(label, cell)` pairs in column order.
    pub fn pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
    }
}

/// Parses a CSV body. Only an unreadable header fails the call.
pub fn parse_table(text: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_label).collect();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut record = StringRecord::new();
    let mut fallback_line = 1usize;

    loop {
        fallback_line += 1;
        let outcome = reader.read_record(&mut record);
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);
        match outcome {
            Ok(false) => break,
            Ok(true) if record.len() == headers.len() => {
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(true) => {
                let message = format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                );
                warn!(line, %message, "skipping malformed row");
                row_errors.push(RowError { line, message });
            }
            Err(e) => {
                let message = format!("CSV parse error: {e}");
                warn!(line, %message, "skipping malformed row");
                row_errors.push(RowError { line, message });
            }
        }
    }

    debug!(columns = headers.len(), rows = rows.len(), skipped = row_errors.len(), "parsed table");
    Ok(Table {
        headers,
        rows,
        row_errors,
    })
}

fn normalize_label(name: &str) -> String {
    // Exports saved by spreadsheet tools can carry a UTF-8 BOM on the first label.
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}
