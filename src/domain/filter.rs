//! Caller-facing screening criteria.
//!
//! `FilterSpec` is deliberately "one field per filter dimension" rather than a
//! free-form map: it is what the CLI builds from flags, what `--filters` files
//! deserialize into, and what the query compiler reads. Supplying more than one
//! representation for a dimension (e.g. a preset in `price_min` *and* a number
//! in `price_max`) is allowed; the encoders document which one wins.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A threshold for one side of a numeric filter dimension.
///
/// `Preset` carries a value already in the provider's shorthand (`o5`, `u10`,
/// `10to20`). A preset string that parses as a plain number is treated as
/// `Value` by the encoders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Value(f64),
    Preset(String),
}

impl Threshold {
    /// Numeric view of the threshold, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Threshold::Value(v) => Some(*v),
            Threshold::Preset(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Value(value)
    }
}

impl From<i64> for Threshold {
    fn from(value: i64) -> Self {
        Threshold::Value(value as f64)
    }
}

impl From<&str> for Threshold {
    fn from(value: &str) -> Self {
        Threshold::Preset(value.to_string())
    }
}

impl From<String> for Threshold {
    fn from(value: String) -> Self {
        Threshold::Preset(value)
    }
}

/// Earnings-date filter in any of the accepted input shapes.
///
/// - `Range`: calendar pair; each side may be ISO (`2025-06-30`), slash
///   (`06/30/2025`) or already in provider form (`06-30-2025`).
/// - `Keywords`: OR-list of symbolic keywords (`today_after`, `this_week`, ...).
/// - `Text`: a single keyword, or a pre-joined range (`06-30-2025x07-04-2025`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EarningsDate {
    Range { start: String, end: String },
    Keywords(Vec<String>),
    Text(String),
}

impl EarningsDate {
    pub fn keyword(value: impl Into<String>) -> Self {
        EarningsDate::Text(value.into())
    }

    pub fn range(start: impl Into<String>, end: impl Into<String>) -> Self {
        EarningsDate::Range {
            start: start.into(),
            end: end.into(),
        }
    }

    /// The single keyword this value holds, if it is one.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            EarningsDate::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Fixed-order token recipes.
///
/// Each recipe reproduces a reference query string byte-for-byte; see
/// `query::recipe` for the triggering signatures and token orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Recipe {
    VolumeSurge,
    EarningsAfterhours,
    EarningsTrading,
    Uptrend,
}

impl Recipe {
    pub fn name(self) -> &'static str {
        match self {
            Recipe::VolumeSurge => "volume-surge",
            Recipe::EarningsAfterhours => "earnings-afterhours",
            Recipe::EarningsTrading => "earnings-trading",
            Recipe::Uptrend => "uptrend",
        }
    }
}

/// Named, ready-made screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScreenerPreset {
    VolumeSurge,
    Uptrend,
    EarningsPremarket,
    EarningsAfterhours,
    EarningsTrading,
}

/// Abstract screening criteria, one field per filter dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Named bucket (`mega`, `smallover`, ...) or a literal range (`10to20`).
    pub market_cap: Option<String>,
    /// Numeric market-cap range in billions.
    pub market_cap_min: Option<f64>,
    pub market_cap_max: Option<f64>,

    pub price_min: Option<Threshold>,
    pub price_max: Option<Threshold>,
    pub volume_min: Option<Threshold>,
    pub volume_max: Option<Threshold>,
    /// Average volume in shares; numeric minimums snap to the bucket ladder.
    pub avg_volume_min: Option<Threshold>,
    pub avg_volume_max: Option<Threshold>,
    pub relative_volume_min: Option<Threshold>,
    pub relative_volume_max: Option<Threshold>,
    /// Daily price change in percent.
    pub price_change_min: Option<Threshold>,
    pub price_change_max: Option<Threshold>,
    pub price_change_positive: bool,
    pub afterhours_change_min: Option<f64>,

    /// Within N percent of the 52-week high.
    pub near_52w_high: Option<f64>,
    pub performance_4w_positive: bool,
    /// Provider range keyword; only `0_to_negative_4w` is understood.
    pub performance_4w_range: Option<String>,
    /// Pre-encoded weekly performance value (e.g. `5to-1w`).
    pub weekly_performance: Option<String>,
    pub volatility_min: Option<f64>,

    pub sma20_above: bool,
    pub sma50_above: bool,
    pub sma200_above: bool,
    pub sma50_above_sma200: bool,

    pub rsi_min: Option<Threshold>,
    pub rsi_max: Option<Threshold>,
    pub pe_min: Option<Threshold>,
    pub pe_max: Option<Threshold>,
    pub dividend_yield_min: Option<Threshold>,
    pub dividend_yield_max: Option<Threshold>,

    /// Human sector names (`Technology`) or provider codes (`technology`).
    pub sectors: Vec<String>,
    pub earnings_date: Option<EarningsDate>,
    /// Reported yesterday after close or today before open.
    pub earnings_recent: bool,

    pub eps_growth_qoq_min: Option<f64>,
    pub eps_revision_min: Option<f64>,
    pub earnings_revision_positive: bool,
    pub sales_growth_qoq_min: Option<f64>,

    pub stocks_only: bool,

    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub max_results: Option<usize>,
    /// Explicit provider column indices; the full column set when absent.
    pub columns: Option<Vec<u16>>,

    /// Forces a recipe when no higher-priority recipe signature matches first.
    pub recipe_hint: Option<Recipe>,
}

impl FilterSpec {
    pub fn preset(preset: ScreenerPreset) -> Self {
        match preset {
            ScreenerPreset::VolumeSurge => Self::volume_surge(),
            ScreenerPreset::Uptrend => Self::uptrend(),
            ScreenerPreset::EarningsPremarket => Self::earnings_premarket(),
            ScreenerPreset::EarningsAfterhours => Self::earnings_afterhours(),
            ScreenerPreset::EarningsTrading => Self::earnings_trading(),
        }
    }

    /// Small caps and up trading on unusually heavy volume while up at least 2%.
    pub fn volume_surge() -> Self {
        Self {
            market_cap: Some("smallover".into()),
            avg_volume_min: Some(Threshold::Value(100_000.0)),
            price_min: Some(Threshold::Value(10.0)),
            relative_volume_min: Some(Threshold::Value(1.5)),
            price_change_min: Some(Threshold::Value(2.0)),
            sma200_above: true,
            stocks_only: true,
            sort_by: Some("price_change".into()),
            sort_order: SortOrder::Desc,
            ..Self::default()
        }
    }

    /// Micro caps and up near their 52-week high with stacked moving averages.
    pub fn uptrend() -> Self {
        Self {
            market_cap: Some("microover".into()),
            avg_volume_min: Some(Threshold::Value(100.0)),
            price_min: Some(Threshold::Value(10.0)),
            near_52w_high: Some(30.0),
            performance_4w_positive: true,
            sma20_above: true,
            sma200_above: true,
            sma50_above_sma200: true,
            stocks_only: true,
            sort_by: Some("eps_growth_yoy".into()),
            sort_order: SortOrder::Desc,
            ..Self::default()
        }
    }

    pub fn earnings_premarket() -> Self {
        Self {
            earnings_date: Some(EarningsDate::keyword("today_before")),
            market_cap: Some("smallover".into()),
            avg_volume_min: Some(Threshold::Value(100_000.0)),
            price_min: Some(Threshold::Value(10.0)),
            price_change_min: Some(Threshold::Value(2.0)),
            stocks_only: true,
            sort_by: Some("price_change".into()),
            sort_order: SortOrder::Desc,
            max_results: Some(60),
            ..Self::default()
        }
    }

    pub fn earnings_afterhours() -> Self {
        Self {
            earnings_date: Some(EarningsDate::keyword("today_after")),
            market_cap: Some("smallover".into()),
            avg_volume_min: Some(Threshold::Value(100_000.0)),
            price_min: Some(Threshold::Value(10.0)),
            afterhours_change_min: Some(2.0),
            stocks_only: true,
            sort_by: Some("afterhours_change".into()),
            sort_order: SortOrder::Desc,
            max_results: Some(60),
            ..Self::default()
        }
    }

    /// Post-earnings pullbacks in names with rising estimates.
    pub fn earnings_trading() -> Self {
        Self {
            earnings_recent: true,
            market_cap: Some("midover".into()),
            earnings_revision_positive: true,
            avg_volume_min: Some(Threshold::Value(200_000.0)),
            price_min: Some(Threshold::Value(30.0)),
            price_change_positive: true,
            performance_4w_range: Some("0_to_negative_4w".into()),
            stocks_only: true,
            sort_by: Some("eps_surprise".into()),
            sort_order: SortOrder::Desc,
            max_results: Some(60),
            recipe_hint: Some(Recipe::EarningsTrading),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mixed_threshold_shapes() {
        let spec: FilterSpec = serde_json::from_str(
            r#"{
                "market_cap": "smallover",
                "price_min": 10.5,
                "price_max": "u50",
                "earnings_date": ["today_after", "tomorrow_before"],
                "sectors": ["Technology"],
                "stocks_only": true
            }"#,
        )
        .unwrap();

        assert_eq!(spec.price_min, Some(Threshold::Value(10.5)));
        assert_eq!(spec.price_max, Some(Threshold::Preset("u50".into())));
        assert_eq!(
            spec.earnings_date,
            Some(EarningsDate::Keywords(vec![
                "today_after".into(),
                "tomorrow_before".into()
            ]))
        );
        assert_eq!(spec.sort_order, SortOrder::Desc);
        assert!(spec.stocks_only);
        assert!(!spec.sma200_above);
    }

    #[test]
    fn earnings_range_object_deserializes_as_range() {
        let date: EarningsDate =
            serde_json::from_str(r#"{"start": "2025-06-30", "end": "2025-07-04"}"#).unwrap();
        assert_eq!(date, EarningsDate::range("2025-06-30", "2025-07-04"));
        assert_eq!(date.as_single(), None);
    }

    #[test]
    fn numeric_preset_string_has_number_view() {
        assert_eq!(Threshold::from("12.5").as_number(), Some(12.5));
        assert_eq!(Threshold::from("o5").as_number(), None);
        assert_eq!(Threshold::from(7_i64).as_number(), Some(7.0));
    }

    #[test]
    fn earnings_trading_preset_carries_recipe_hint() {
        let spec = FilterSpec::preset(ScreenerPreset::EarningsTrading);
        assert_eq!(spec.recipe_hint, Some(Recipe::EarningsTrading));
        assert_eq!(spec.max_results, Some(60));
    }
}
