//! Typed output records.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One cleaned cell value.
///
/// `Null` stands for every "no data" sentinel the provider emits
/// (`-`, `N/A`, empty cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "-"),
            FieldValue::Bool(true) => write!(f, "Yes"),
            FieldValue::Bool(false) => write!(f, "No"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One screened or fetched stock.
///
/// Fields keep the provider's column order and are keyed by canonical field
/// name (`pe_ratio`, `performance_1w`, ...); columns without a known field
/// name keep their canonical column key. Records are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    ticker: String,
    fields: Vec<(String, FieldValue)>,
}

impl StockRecord {
    pub fn new(ticker: impl Into<String>, fields: Vec<(String, FieldValue)>) -> Self {
        Self {
            ticker: ticker.into(),
            fields,
        }
    }

    /// Ticker-only stand-in for a fetch that produced no data.
    pub fn placeholder(ticker: impl Into<String>) -> Self {
        Self::new(ticker, Vec::new())
    }

    /// Placeholder carrying an explicit null for every requested field.
    pub fn placeholder_with(ticker: impl Into<String>, requested: &[String]) -> Self {
        let fields = requested
            .iter()
            .map(|name| (name.clone(), FieldValue::Null))
            .collect();
        Self::new(ticker, fields)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// True when no field carries data.
    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_null())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    pub fn company_name(&self) -> Option<&str> {
        self.text("company_name")
    }

    pub fn sector(&self) -> Option<&str> {
        self.text("sector")
    }

    pub fn industry(&self) -> Option<&str> {
        self.text("industry")
    }

    pub fn price(&self) -> Option<f64> {
        self.number("price")
    }

    pub fn price_change(&self) -> Option<f64> {
        self.number("price_change")
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.number("market_cap")
    }

    pub fn volume(&self) -> Option<f64> {
        self.number("volume")
    }

    pub fn relative_volume(&self) -> Option<f64> {
        self.number("relative_volume")
    }

    pub fn earnings_date(&self) -> Option<&str> {
        self.text("earnings_date")
    }
}

impl Serialize for StockRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("ticker", &self.ticker)?;
        for (key, value) in &self.fields {
            if key != "ticker" {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StockRecord {
        StockRecord::new(
            "AAPL",
            vec![
                ("company_name".into(), FieldValue::Text("Apple Inc.".into())),
                ("price".into(), FieldValue::Float(189.5)),
                ("volume".into(), FieldValue::Int(51_000_000)),
                ("optionable".into(), FieldValue::Bool(true)),
                ("dividend".into(), FieldValue::Null),
            ],
        )
    }

    #[test]
    fn typed_accessors_read_matching_variants() {
        let r = sample();
        assert_eq!(r.ticker(), "AAPL");
        assert_eq!(r.company_name(), Some("Apple Inc."));
        assert_eq!(r.price(), Some(189.5));
        assert_eq!(r.volume(), Some(51_000_000.0));
        assert_eq!(r.flag("optionable"), Some(true));
        assert_eq!(r.number("dividend"), None);
        assert_eq!(r.text("price"), None);
        assert!(!r.is_empty());
    }

    #[test]
    fn placeholders_are_empty() {
        assert!(StockRecord::placeholder("MSFT").is_empty());
        let requested = vec!["price".to_string(), "roe".to_string()];
        let p = StockRecord::placeholder_with("MSFT", &requested);
        assert!(p.is_empty());
        assert_eq!(p.get("roe"), Some(&FieldValue::Null));
    }

    #[test]
    fn serializes_ticker_first_then_fields_in_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"ticker":"AAPL","company_name":"Apple Inc.","price":189.5,"volume":51000000,"optionable":true,"dividend":null}"#
        );
    }
}
