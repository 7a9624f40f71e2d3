//! Field normalizer: cell cleaning, canonical keys and field-name resolution.
//!
//! Column labels (`P/E`, `EPS (ttm)`, `Float %`) are reduced to canonical
//! keys (`p_e`, `eps_ttm`, `float_percent`) and mapped to field names through
//! `FIELD_COLUMNS`. Caller requests resolve against a record in three stages:
//!
//! 1. exact canonical key (or a column label naming a known field)
//! 2. the documented alias table (`roi` -> `roic`)
//! 3. a bounded substring match, logged every time it fires

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::warn;

use crate::domain::{FieldValue, StockRecord};

/// Values the provider uses for "no data".
pub const SENTINELS: &[&str] = &["-", "N/A", ""];

/// Shortest request that may fall through to substring matching.
pub const MIN_FUZZY_LEN: usize = 3;

/// Field name -> provider column label. A field may be listed under more than
/// one label; the first entry is the one used when rendering.
pub const FIELD_COLUMNS: &[(&str, &str)] = &[
    ("ticker", "Ticker"),
    ("company_name", "Company"),
    ("sector", "Sector"),
    ("industry", "Industry"),
    ("country", "Country"),
    ("index", "Index"),
    ("exchange", "Exchange"),
    ("market_cap", "Market Cap"),
    ("pe_ratio", "P/E"),
    ("forward_pe", "Forward P/E"),
    ("peg", "PEG"),
    ("ps_ratio", "P/S"),
    ("pb_ratio", "P/B"),
    ("price_to_cash", "P/Cash"),
    ("price_to_free_cash_flow", "P/Free Cash Flow"),
    ("book_value_per_share", "Book/sh"),
    ("cash_per_share", "Cash/sh"),
    ("dividend", "Dividend"),
    ("dividend_yield", "Dividend Yield"),
    ("payout_ratio", "Payout Ratio"),
    ("eps", "EPS (ttm)"),
    ("eps_next_q", "EPS Next Q"),
    ("eps_this_y", "EPS this Y"),
    ("eps_next_y", "EPS next Y"),
    ("eps_past_5y", "EPS past 5Y"),
    ("eps_next_5y", "EPS next 5Y"),
    ("sales_past_5y", "Sales past 5Y"),
    ("sales_past_5y", "Sales Growth Past 5 Years"),
    ("eps_growth_this_y", "EPS growth this Y"),
    ("eps_growth_this_y", "EPS Growth This Year"),
    ("eps_growth_next_y", "EPS growth next Y"),
    ("eps_growth_next_y", "EPS Growth Next Year"),
    ("eps_growth_past_5y", "EPS growth past 5Y"),
    ("eps_growth_past_5y", "EPS Growth Past 5 Years"),
    ("eps_growth_next_5y", "EPS growth next 5Y"),
    ("eps_growth_next_5y", "EPS Growth Next 5 Years"),
    ("eps_growth_qtr", "EPS Q/Q"),
    ("eps_growth_qtr", "EPS Growth Quarter Over Quarter"),
    ("sales_growth_qtr", "Sales Q/Q"),
    ("sales_growth_qtr", "Sales Growth Quarter Over Quarter"),
    ("eps_surprise", "EPS Surprise"),
    ("revenue_surprise", "Revenue Surprise"),
    ("eps_estimate", "EPS Estimate"),
    ("revenue_estimate", "Revenue Estimate"),
    ("eps_actual", "EPS Actual"),
    ("revenue_actual", "Revenue Actual"),
    ("eps_revision", "EPS Revision"),
    ("revenue_revision", "Revenue Revision"),
    ("income", "Income"),
    ("sales", "Sales"),
    ("employees", "Employees"),
    ("shares_outstanding", "Shares Outstanding"),
    ("shares_float", "Shares Float"),
    ("float_percentage", "Float %"),
    ("insider_ownership", "Insider Ownership"),
    ("insider_transactions", "Insider Transactions"),
    ("institutional_ownership", "Institutional Ownership"),
    ("institutional_transactions", "Institutional Transactions"),
    ("float_short", "Short Float"),
    ("short_ratio", "Short Ratio"),
    ("short_interest", "Short Interest"),
    ("roa", "Return on Assets"),
    ("roe", "Return on Equity"),
    ("roic", "Return on Invested Capital"),
    ("current_ratio", "Current Ratio"),
    ("quick_ratio", "Quick Ratio"),
    ("lt_debt_to_equity", "LT Debt/Equity"),
    ("debt_to_equity", "Total Debt/Equity"),
    ("gross_margin", "Gross Margin"),
    ("operating_margin", "Operating Margin"),
    ("profit_margin", "Profit Margin"),
    ("performance_1min", "Performance (1 Minute)"),
    ("performance_2min", "Performance (2 Minutes)"),
    ("performance_3min", "Performance (3 Minutes)"),
    ("performance_5min", "Performance (5 Minutes)"),
    ("performance_10min", "Performance (10 Minutes)"),
    ("performance_15min", "Performance (15 Minutes)"),
    ("performance_30min", "Performance (30 Minutes)"),
    ("performance_1h", "Performance (1 Hour)"),
    ("performance_2h", "Performance (2 Hours)"),
    ("performance_4h", "Performance (4 Hours)"),
    ("performance_1w", "Performance (Week)"),
    ("performance_1m", "Performance (Month)"),
    ("performance_3m", "Performance (Quarter)"),
    ("performance_6m", "Performance (Half Year)"),
    ("performance_ytd", "Performance (YTD)"),
    ("performance_1y", "Performance (Year)"),
    ("performance_3y", "Return 3 Year"),
    ("performance_5y", "Return 5 Year"),
    ("performance_10y", "Return 10 Year"),
    ("performance_since_inception", "Return Since Inception"),
    ("beta", "Beta"),
    ("atr", "Average True Range"),
    ("volatility", "Volatility"),
    ("volatility_week", "Volatility (Week)"),
    ("volatility_month", "Volatility (Month)"),
    ("sma_20", "20-Day Simple Moving Average"),
    ("sma_50", "50-Day Simple Moving Average"),
    ("sma_200", "200-Day Simple Moving Average"),
    ("day_50_high", "50-Day High"),
    ("day_50_low", "50-Day Low"),
    ("week_52_high", "52-Week High"),
    ("week_52_low", "52-Week Low"),
    ("all_time_high", "All-Time High"),
    ("all_time_low", "All-Time Low"),
    ("rsi", "Relative Strength Index (14)"),
    ("change_from_open", "Change from Open"),
    ("gap", "Gap"),
    ("analyst_recommendation", "Analysts Recom"),
    ("analyst_recommendation", "Recom"),
    ("avg_volume", "Average Volume"),
    ("relative_volume", "Relative Volume"),
    ("price", "Price"),
    ("price_change", "Change"),
    ("volume", "Volume"),
    ("prev_close", "Prev Close"),
    ("open_price", "Open"),
    ("high_price", "High"),
    ("low_price", "Low"),
    ("trades_count", "Trades"),
    ("earnings_date", "Earnings Date"),
    ("earnings_date", "Earnings"),
    ("earnings_date", "Next Earnings Date"),
    ("earnings_timing", "Earnings Time"),
    ("target_price", "Target Price"),
    ("ipo_date", "IPO Date"),
    ("afterhours_price", "After-Hours Close"),
    ("afterhours_change", "After-Hours Change"),
    ("optionable", "Optionable"),
    ("shortable", "Shortable"),
    ("single_category", "Category"),
    ("asset_type", "Asset Type"),
    ("etf_type", "ETF Type"),
    ("sector_theme", "Sector/Theme"),
    ("region", "Region"),
    ("active_passive", "Active/Passive"),
    ("tags", "Tags"),
    ("total_holdings", "Total Holdings"),
    ("aum", "Assets Under Management"),
    ("nav", "Net Asset Value"),
    ("nav_percent", "Net Asset Value %"),
    ("net_flows_1m", "Net Flows (1 Month)"),
    ("net_flows_1m_percent", "Net Flows % (1 Month)"),
    ("net_flows_3m", "Net Flows (3 Month)"),
    ("net_flows_3m_percent", "Net Flows % (3 Month)"),
    ("net_flows_ytd", "Net Flows (YTD)"),
    ("net_flows_ytd_percent", "Net Flows % (YTD)"),
    ("net_flows_1y", "Net Flows (1 Year)"),
    ("net_flows_1y_percent", "Net Flows % (1 Year)"),
];

/// Alternate request name -> field name.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("roi", "roic"),
    ("debt_equity", "debt_to_equity"),
    ("book_value", "book_value_per_share"),
    ("performance_week", "performance_1w"),
    ("performance_month", "performance_1m"),
    ("performance_quarter", "performance_3m"),
    ("performance_half_year", "performance_6m"),
    ("performance_year", "performance_1y"),
    ("short_float", "float_short"),
    ("change", "price_change"),
    ("price_change_percent", "price_change"),
    ("rel_volume", "relative_volume"),
    ("average_volume", "avg_volume"),
    ("rsi_14", "rsi"),
    ("avg_true_range", "atr"),
    ("eps_qoq_growth", "eps_growth_qtr"),
    ("sales_qoq_growth", "sales_growth_qtr"),
    ("premarket_price", "afterhours_price"),
    ("premarket_change", "afterhours_change"),
    ("premarket_change_percent", "afterhours_change"),
    ("afterhours_change_percent", "afterhours_change"),
    ("high_52w_relative", "week_52_high"),
    ("low_52w_relative", "week_52_low"),
    ("sma_20_relative", "sma_20"),
    ("sma_50_relative", "sma_50"),
    ("sma_200_relative", "sma_200"),
    ("company", "company_name"),
    ("pe", "pe_ratio"),
    ("ps", "ps_ratio"),
    ("pb", "pb_ratio"),
    ("recom", "analyst_recommendation"),
];

/// Fields kept as text: only sentinels are turned into nulls.
pub const TEXT_FIELDS: &[&str] = &[
    "ticker",
    "company_name",
    "sector",
    "industry",
    "country",
    "index",
    "exchange",
    "earnings_date",
    "earnings_timing",
    "ipo_date",
    "single_category",
    "asset_type",
    "etf_type",
    "sector_theme",
    "region",
    "active_passive",
    "tags",
];

/// Fields the provider reports as `Yes`/`No`.
pub const YES_NO_FIELDS: &[&str] = &["optionable", "shortable"];

static COLUMN_TO_FIELD: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (field, label) in FIELD_COLUMNS {
        map.entry(canonical_key(label)).or_insert(*field);
    }
    map
});

pub fn is_sentinel(raw: &str) -> bool {
    SENTINELS.contains(&raw.trim())
}

/// Lowercases, spells `%` as `percent` and collapses every other run of
/// non-alphanumerics into one `_`.
pub fn canonical_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.trim().trim_start_matches('\u{feff}').chars() {
        let piece = if ch == '%' {
            Some("percent".to_string())
        } else if ch.is_alphanumeric() {
            Some(ch.to_lowercase().collect())
        } else {
            None
        };
        match piece {
            Some(piece) => {
                if pending_sep && !key.is_empty() {
                    key.push('_');
                }
                pending_sep = ch == '%';
                key.push_str(&piece);
            }
            None => pending_sep = true,
        }
    }
    key
}

/// Field name for a canonical column key.
pub fn field_for_column(key: &str) -> Option<&'static str> {
    COLUMN_TO_FIELD.get(key).copied()
}

/// Primary column label for a field name.
pub fn column_for_field(field: &str) -> Option<&'static str> {
    FIELD_COLUMNS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, label)| *label)
}

/// Field an alias points at.
pub fn alias_target(alias: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, target)| *target)
}

/// Cleans one cell.
///
/// In order: leading `$`, thousands separators, trailing `%`, `B`/`M`/`K`
/// magnitude suffix, sentinels, then integer, float, and finally the trimmed
/// original text.
pub fn clean_cell(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let cleaned = unsigned.replace(',', "");

    if let Some(number) = cleaned.strip_suffix('%') {
        if let Some(v) = parse_float(number) {
            return FieldValue::Float(v);
        }
    }

    for (suffix, scale) in [('B', 1e9), ('M', 1e6), ('K', 1e3)] {
        if let Some(number) = cleaned.strip_suffix(suffix) {
            if let Some(v) = parse_float(number) {
                return FieldValue::Float(v * scale);
            }
        }
    }

    if is_sentinel(&cleaned) {
        return FieldValue::Null;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return FieldValue::Int(v);
    }
    if let Some(v) = parse_float(&cleaned) {
        return FieldValue::Float(v);
    }
    FieldValue::Text(trimmed.to_string())
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalizes a cell for a known field name.
pub fn normalize_field(field: &str, raw: &str) -> FieldValue {
    if is_sentinel(raw) {
        return FieldValue::Null;
    }
    if YES_NO_FIELDS.contains(&field) {
        return match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => FieldValue::Bool(true),
            "no" | "false" | "0" => FieldValue::Bool(false),
            _ => FieldValue::Text(raw.trim().to_string()),
        };
    }
    if TEXT_FIELDS.contains(&field) {
        return FieldValue::Text(raw.trim().to_string());
    }
    clean_cell(raw)
}

/// Which resolution stage matched a requested field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    Alias,
    Fuzzy,
}

/// A requested field located in a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<'r> {
    pub field: &'r str,
    pub value: &'r FieldValue,
    pub how: Resolution,
}

/// Resolves a caller-supplied field name against a record.
pub fn resolve_field<'r>(record: &'r StockRecord, requested: &str) -> Option<Resolved<'r>> {
    let key = canonical_key(requested);
    if key.is_empty() {
        return None;
    }

    let exact = [Some(key.as_str()), field_for_column(&key)];
    for name in exact.into_iter().flatten() {
        if let Some(found) = lookup(record, name, Resolution::Exact) {
            return Some(found);
        }
    }

    if let Some(found) = alias_target(&key).and_then(|target| lookup(record, target, Resolution::Alias)) {
        return Some(found);
    }

    if key.len() < MIN_FUZZY_LEN {
        return None;
    }
    let found = record
        .fields()
        .iter()
        .filter(|(name, _)| name.len() >= MIN_FUZZY_LEN)
        .filter(|(name, _)| name.contains(key.as_str()) || key.contains(name.as_str()))
        .min_by_key(|(name, _)| name.len().abs_diff(key.len()))?;
    warn!(requested, matched = %found.0, "fuzzy field resolution");
    Some(Resolved {
        field: &found.0,
        value: &found.1,
        how: Resolution::Fuzzy,
    })
}

fn lookup<'r>(record: &'r StockRecord, name: &str, how: Resolution) -> Option<Resolved<'r>> {
    record
        .fields()
        .iter()
        .find(|(field, _)| field == name)
        .map(|(field, value)| Resolved { field, value, how })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_currency_percent_and_suffixes() {
        assert_eq!(clean_cell("$1,234.50"), FieldValue::Float(1234.5));
        assert_eq!(clean_cell("12.3%"), FieldValue::Float(12.3));
        assert_eq!(clean_cell("-0.4%"), FieldValue::Float(-0.4));
        assert_eq!(clean_cell("1.2B"), FieldValue::Float(1_200_000_000.0));
        assert_eq!(clean_cell("350.5M"), FieldValue::Float(350_500_000.0));
        assert_eq!(clean_cell("12K"), FieldValue::Float(12_000.0));
        assert_eq!(clean_cell("1,234"), FieldValue::Int(1234));
    }

    #[test]
    fn sentinels_become_null() {
        assert_eq!(clean_cell("-"), FieldValue::Null);
        assert_eq!(clean_cell("N/A"), FieldValue::Null);
        assert_eq!(clean_cell(""), FieldValue::Null);
        assert_eq!(clean_cell("  "), FieldValue::Null);
    }

    #[test]
    fn text_falls_back_to_trimmed_original() {
        assert_eq!(clean_cell(" Apple Inc. "), FieldValue::Text("Apple Inc.".into()));
        assert_eq!(clean_cell("BANK"), FieldValue::Text("BANK".into()));
        assert_eq!(clean_cell("Jan 30/a"), FieldValue::Text("Jan 30/a".into()));
    }

    #[test]
    fn canonical_keys() {
        assert_eq!(canonical_key("P/E"), "p_e");
        assert_eq!(canonical_key("EPS (ttm)"), "eps_ttm");
        assert_eq!(canonical_key("Float %"), "float_percent");
        assert_eq!(canonical_key("Net Flows % (1 Month)"), "net_flows_percent_1_month");
        assert_eq!(canonical_key("52-Week High"), "52_week_high");
        assert_eq!(canonical_key("\u{feff}Ticker"), "ticker");
    }

    #[test]
    fn column_and_field_tables_agree() {
        assert_eq!(field_for_column("p_e"), Some("pe_ratio"));
        assert_eq!(field_for_column("eps_growth_quarter_over_quarter"), Some("eps_growth_qtr"));
        assert_eq!(column_for_field("roic"), Some("Return on Invested Capital"));
        assert_eq!(alias_target("roi"), Some("roic"));
        assert_eq!(alias_target("premarket_change"), Some("afterhours_change"));
        for (field, label) in FIELD_COLUMNS {
            assert_eq!(field_for_column(&canonical_key(label)), Some(*field), "{label}");
        }
        for (alias, target) in FIELD_ALIASES {
            assert!(column_for_field(target).is_some(), "{alias} -> {target}");
        }
    }

    #[test]
    fn typed_fields_normalize_by_kind() {
        assert_eq!(normalize_field("optionable", "Yes"), FieldValue::Bool(true));
        assert_eq!(normalize_field("shortable", "No"), FieldValue::Bool(false));
        assert_eq!(normalize_field("ipo_date", "12/12/1980"), FieldValue::Text("12/12/1980".into()));
        assert_eq!(normalize_field("company_name", "1-800-Flowers"), FieldValue::Text("1-800-Flowers".into()));
        assert_eq!(normalize_field("earnings_date", "-"), FieldValue::Null);
        assert_eq!(normalize_field("price", "$10"), FieldValue::Int(10));
    }

    fn record() -> StockRecord {
        StockRecord::new(
            "AAPL",
            vec![
                ("pe_ratio".into(), FieldValue::Float(29.1)),
                ("roic".into(), FieldValue::Float(55.2)),
                ("performance_1w".into(), FieldValue::Float(1.4)),
                ("institutional_ownership".into(), FieldValue::Float(61.0)),
            ],
        )
    }

    #[test]
    fn resolves_exact_then_alias_then_fuzzy() {
        let r = record();

        let exact = resolve_field(&r, "pe_ratio").unwrap();
        assert_eq!((exact.field, exact.how), ("pe_ratio", Resolution::Exact));

        let by_label = resolve_field(&r, "P/E").unwrap();
        assert_eq!((by_label.field, by_label.how), ("pe_ratio", Resolution::Exact));

        let alias = resolve_field(&r, "roi").unwrap();
        assert_eq!((alias.field, alias.how), ("roic", Resolution::Alias));
        assert_eq!(alias.value, &FieldValue::Float(55.2));

        let fuzzy = resolve_field(&r, "institutional").unwrap();
        assert_eq!((fuzzy.field, fuzzy.how), ("institutional_ownership", Resolution::Fuzzy));
    }

    #[test]
    fn fuzzy_fallback_is_bounded() {
        let r = record();
        assert!(resolve_field(&r, "ro").is_none());
        assert!(resolve_field(&r, "dividend").is_none());
        assert!(resolve_field(&r, "").is_none());
    }
}
