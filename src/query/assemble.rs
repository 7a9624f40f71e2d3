//! Query assembly: filter string, sort, columns, result cap and auth.

use tracing::debug;

use super::encode::{
    encode_numeric_range, encode_range, format_number, DIVIDEND_YIELD, MARKET_CAP_RANGE, PE,
    PRICE, PRICE_CHANGE, RELATIVE_VOLUME, RSI, VOLUME,
};
use super::presets::{encode_avg_volume, encode_earnings_date, encode_market_cap, encode_sectors};
use super::recipe::{build_recipe, default_sort, select_recipe};
use super::{EncodeError, EncodeMode, Token};
use crate::domain::{FilterSpec, Recipe, SortOrder};
use crate::error::{self, ScreenerError};

/// Largest result cap the provider accepts.
pub const MAX_RESULT_CAP: usize = 1000;

pub const SCREEN_VIEW: &str = "151";
pub const FUNDAMENTALS_VIEW: &str = "152";
pub const CSV_FORMAT: &str = "4";
pub const DEFAULT_SORT_FIELD: &str = "ticker";

/// Column indices for the fundamentals view, in the provider's display order.
pub const FUNDAMENTALS_COLUMNS: &str = "0,1,2,79,3,4,5,129,6,7,8,9,10,11,12,13,73,74,75,14,130,131,147,148,149,15,16,77,17,18,142,19,20,143,21,23,22,132,133,82,78,127,128,144,145,146,24,25,85,26,27,28,29,30,31,84,32,33,34,35,36,37,38,39,40,41,90,91,92,93,94,95,96,97,98,99,42,43,44,45,47,46,138,139,140,48,49,50,51,52,53,54,55,56,57,58,134,125,126,59,68,70,80,83,76,60,61,62,63,64,67,89,69,81,86,87,88,65,66,71,72,141,135,136,137,103,100,101,104,102,106,107,108,109,110,111,112,113,114,115,116,117,118,119,120,121,122,123,124,105";

const SCREEN_COLUMN_COUNT: u16 = 129;

/// Abstract sort name -> provider sort field.
pub const SORT_FIELDS: &[(&str, &str)] = &[
    ("ticker", "ticker"),
    ("price", "price"),
    ("price_change", "change"),
    ("afterhours_change", "afterchange"),
    ("volume", "volume"),
    ("relative_volume", "relvol"),
    ("market_cap", "marketcap"),
    ("performance_1w", "perf1w"),
    ("eps_growth_yoy", "epsyoy1"),
    ("eps_growth_this_y", "epsthisy"),
    ("eps_surprise", "epssurprise"),
    ("dividend_yield", "dividendyield"),
    ("pe_ratio", "pe"),
    ("rsi", "rsi"),
];

/// One filter dimension of `FilterSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    MarketCap,
    MarketCapRange,
    StocksOnly,
    Price,
    Volume,
    AvgVolume,
    RelativeVolume,
    PriceChange,
    Near52wHigh,
    Performance4wPositive,
    Rsi,
    Sma20,
    Sma50,
    Sma200,
    Sma50OverSma200,
    Pe,
    DividendYield,
    Sectors,
    EarningsDate,
    EpsGrowthQoq,
    EpsRevision,
    SalesGrowthQoq,
    EarningsRecent,
    EpsRevisionPositive,
    PriceChangePositive,
    Performance4wRange,
    Volatility,
    WeeklyPerformance,
    AfterhoursChange,
}

impl Dimension {
    /// Order of the generic accumulation path.
    pub const GENERIC_ORDER: [Dimension; 29] = [
        Dimension::MarketCap,
        Dimension::MarketCapRange,
        Dimension::StocksOnly,
        Dimension::Price,
        Dimension::Volume,
        Dimension::AvgVolume,
        Dimension::RelativeVolume,
        Dimension::PriceChange,
        Dimension::Near52wHigh,
        Dimension::Performance4wPositive,
        Dimension::Rsi,
        Dimension::Sma20,
        Dimension::Sma50,
        Dimension::Sma200,
        Dimension::Sma50OverSma200,
        Dimension::Pe,
        Dimension::DividendYield,
        Dimension::Sectors,
        Dimension::EarningsDate,
        Dimension::EpsGrowthQoq,
        Dimension::EpsRevision,
        Dimension::SalesGrowthQoq,
        Dimension::EarningsRecent,
        Dimension::EpsRevisionPositive,
        Dimension::PriceChangePositive,
        Dimension::Performance4wRange,
        Dimension::Volatility,
        Dimension::WeeklyPerformance,
        Dimension::AfterhoursChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::MarketCap => "market_cap",
            Dimension::MarketCapRange => "market_cap_range",
            Dimension::StocksOnly => "stocks_only",
            Dimension::Price => "price",
            Dimension::Volume => "volume",
            Dimension::AvgVolume => "avg_volume",
            Dimension::RelativeVolume => "relative_volume",
            Dimension::PriceChange => "price_change",
            Dimension::Near52wHigh => "near_52w_high",
            Dimension::Performance4wPositive => "performance_4w_positive",
            Dimension::Rsi => "rsi",
            Dimension::Sma20 => "sma20_above",
            Dimension::Sma50 => "sma50_above",
            Dimension::Sma200 => "sma200_above",
            Dimension::Sma50OverSma200 => "sma50_above_sma200",
            Dimension::Pe => "pe",
            Dimension::DividendYield => "dividend_yield",
            Dimension::Sectors => "sectors",
            Dimension::EarningsDate => "earnings_date",
            Dimension::EpsGrowthQoq => "eps_growth_qoq",
            Dimension::EpsRevision => "eps_revision",
            Dimension::SalesGrowthQoq => "sales_growth_qoq",
            Dimension::EarningsRecent => "earnings_recent",
            Dimension::EpsRevisionPositive => "earnings_revision_positive",
            Dimension::PriceChangePositive => "price_change_positive",
            Dimension::Performance4wRange => "performance_4w_range",
            Dimension::Volatility => "volatility",
            Dimension::WeeklyPerformance => "weekly_performance",
            Dimension::AfterhoursChange => "afterhours_change",
        }
    }
}

fn flag(set: bool, text: &str) -> Result<Option<Token>, EncodeError> {
    Ok(set.then(|| Token::literal(text)))
}

fn scalar(
    value: Option<f64>,
    prefix: &str,
    render: impl Fn(&str) -> String,
) -> Result<Option<Token>, EncodeError> {
    match value {
        None => Ok(None),
        Some(v) if !v.is_finite() => Err(EncodeError::NonFinite(v)),
        Some(v) => Ok(Some(Token::new(prefix, &render(&format_number(v))))),
    }
}

/// Encodes one dimension without applying the lenient/strict policy.
pub fn encode_raw(
    dimension: Dimension,
    spec: &FilterSpec,
    mode: EncodeMode,
) -> Result<Option<Token>, EncodeError> {
    use Dimension as D;

    match dimension {
        D::MarketCap => match spec.market_cap.as_deref() {
            Some(cap) => encode_market_cap(cap),
            None => Ok(None),
        },
        D::MarketCapRange => {
            encode_numeric_range(&MARKET_CAP_RANGE, spec.market_cap_min, spec.market_cap_max)
        }
        D::StocksOnly => flag(spec.stocks_only, "ind_stocksonly"),
        D::Price => encode_range(&PRICE, spec.price_min.as_ref(), spec.price_max.as_ref()),
        D::Volume => encode_range(&VOLUME, spec.volume_min.as_ref(), spec.volume_max.as_ref()),
        D::AvgVolume => encode_avg_volume(spec.avg_volume_min.as_ref(), spec.avg_volume_max.as_ref()),
        D::RelativeVolume => encode_range(
            &RELATIVE_VOLUME,
            spec.relative_volume_min.as_ref(),
            spec.relative_volume_max.as_ref(),
        ),
        D::PriceChange => encode_range(
            &PRICE_CHANGE,
            spec.price_change_min.as_ref(),
            spec.price_change_max.as_ref(),
        ),
        D::Near52wHigh => scalar(spec.near_52w_high, "ta_highlow52w", |v| format!("a{v}h")),
        D::Performance4wPositive => flag(spec.performance_4w_positive, "ta_perf2_4wup"),
        D::Rsi => encode_range(&RSI, spec.rsi_min.as_ref(), spec.rsi_max.as_ref()),
        D::Sma20 => flag(spec.sma20_above, "ta_sma20_pa"),
        D::Sma50 => flag(spec.sma50_above, "ta_sma50_pa"),
        D::Sma200 => flag(spec.sma200_above, "ta_sma200_pa"),
        D::Sma50OverSma200 => flag(spec.sma50_above_sma200, "ta_sma50_sa200"),
        D::Pe => encode_range(&PE, spec.pe_min.as_ref(), spec.pe_max.as_ref()),
        D::DividendYield => encode_range(
            &DIVIDEND_YIELD,
            spec.dividend_yield_min.as_ref(),
            spec.dividend_yield_max.as_ref(),
        ),
        D::Sectors => encode_sectors(&spec.sectors, mode),
        D::EarningsDate => match &spec.earnings_date {
            Some(date) => encode_earnings_date(date, mode),
            None => Ok(None),
        },
        D::EpsGrowthQoq => scalar(spec.eps_growth_qoq_min, "fa_epsqoq", |v| format!("o{v}")),
        D::EpsRevision => scalar(spec.eps_revision_min, "fa_epsrev", |v| format!("eo{v}")),
        D::SalesGrowthQoq => scalar(spec.sales_growth_qoq_min, "fa_salesqoq", |v| format!("o{v}")),
        D::EarningsRecent => flag(spec.earnings_recent, "earningsdate_yesterdayafter|todaybefore"),
        D::EpsRevisionPositive => flag(spec.earnings_revision_positive, "fa_epsrev_ep"),
        D::PriceChangePositive => flag(spec.price_change_positive, "ta_change_u"),
        D::Performance4wRange => match spec.performance_4w_range.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some("0_to_negative_4w") => Ok(Some(Token::literal("ta_perf_0to-4w"))),
            Some(other) => Err(EncodeError::UnknownPerformanceRange(other.to_string())),
        },
        D::Volatility => scalar(spec.volatility_min, "ta_volatility", |v| format!("{v}tox")),
        D::WeeklyPerformance => match spec.weekly_performance.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => Ok(Some(Token::new("ta_perf", value))),
        },
        D::AfterhoursChange => scalar(spec.afterhours_change_min, "ah_change", |v| format!("u{v}")),
    }
}

/// Encodes one dimension under `mode`.
pub fn encode_dimension(
    dimension: Dimension,
    spec: &FilterSpec,
    mode: EncodeMode,
) -> Result<Option<Token>, EncodeError> {
    mode.settle(dimension.name(), encode_raw(dimension, spec, mode))
}

/// The filter half of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub recipe: Option<Recipe>,
    pub tokens: Vec<Token>,
}

impl CompiledFilter {
    /// Tokens joined by `,`.
    pub fn filter_string(&self) -> String {
        self.tokens
            .iter()
            .map(Token::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Recipe head (if any) followed by every unconsumed dimension in generic order.
pub fn compile_filters(
    spec: &FilterSpec,
    mode: EncodeMode,
) -> Result<CompiledFilter, EncodeError> {
    let recipe = select_recipe(spec);
    let (mut tokens, consumed) = match recipe {
        Some(recipe) => {
            debug!(recipe = recipe.name(), "filter matched recipe");
            let head = build_recipe(recipe, spec, mode)?;
            (head.tokens, head.consumed)
        }
        None => (Vec::new(), Vec::new()),
    };

    for dimension in Dimension::GENERIC_ORDER {
        if consumed.contains(&dimension) {
            continue;
        }
        if let Some(token) = encode_dimension(dimension, spec, mode)? {
            tokens.push(token);
        }
    }

    Ok(CompiledFilter { recipe, tokens })
}

/// Provider sort parameter; `-` marks descending.
pub fn sort_param(sort_by: Option<&str>, order: SortOrder) -> String {
    let field = match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => SORT_FIELDS
            .iter()
            .find(|(abstract_name, provider)| *abstract_name == name || *provider == name)
            .map(|(_, provider)| *provider)
            .unwrap_or_else(|| {
                debug!(sort_by = name, fallback = DEFAULT_SORT_FIELD, "unmapped sort field");
                DEFAULT_SORT_FIELD
            }),
        None => DEFAULT_SORT_FIELD,
    };
    match order {
        SortOrder::Desc => format!("-{field}"),
        SortOrder::Asc => field.to_string(),
    }
}

/// Result cap after clamping; zero means "no cap".
pub fn clamp_result_cap(max_results: Option<usize>) -> Option<usize> {
    max_results.filter(|&n| n > 0).map(|n| n.min(MAX_RESULT_CAP))
}

fn column_list(columns: &[u16]) -> String {
    columns
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn default_screen_columns() -> String {
    (0..SCREEN_COLUMN_COUNT)
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn require_auth(auth: Option<&str>) -> error::Result<String> {
    auth.map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScreenerError::config("Finviz API token is required (set FINVIZ_API_KEY)."))
}

/// Final request parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pub view: &'static str,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub columns: Option<String>,
    pub result_cap: Option<usize>,
    pub tickers: Option<String>,
    pub auth: String,
}

impl std::fmt::Debug for QueryParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.redacted_pairs()).finish()
    }
}

impl QueryParameters {
    /// Ordered `(key, value)` pairs as sent on the wire.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("v", self.view.to_string())];
        if let Some(filter) = &self.filter {
            pairs.push(("f", filter.clone()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("o", sort.clone()));
        }
        if let Some(columns) = &self.columns {
            pairs.push(("c", columns.clone()));
        }
        if let Some(cap) = self.result_cap {
            pairs.push(("ar", cap.to_string()));
        }
        if let Some(tickers) = &self.tickers {
            pairs.push(("t", tickers.clone()));
        }
        pairs.push(("ft", CSV_FORMAT.to_string()));
        pairs.push(("auth", self.auth.clone()));
        pairs
    }

    /// Same as `to_pairs` with the auth token masked, for logs and dry runs.
    pub fn redacted_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self.to_pairs();
        for (key, value) in pairs.iter_mut() {
            if *key == "auth" {
                *value = "***".to_string();
            }
        }
        pairs
    }
}

/// A compiled screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenQuery {
    pub recipe: Option<Recipe>,
    pub params: QueryParameters,
}

impl ScreenQuery {
    pub fn result_cap(&self) -> Option<usize> {
        self.params.result_cap
    }
}

/// Compiles a screen against the screener view.
///
/// The caller's spec is only read. A missing auth token is a configuration
/// error raised before any encoding happens.
pub fn compile_screen(
    spec: &FilterSpec,
    auth: Option<&str>,
    mode: EncodeMode,
) -> error::Result<ScreenQuery> {
    let auth = require_auth(auth)?;
    let filter = compile_filters(spec, mode)?;

    let sort_by = spec
        .sort_by
        .as_deref()
        .or_else(|| filter.recipe.map(default_sort));
    let columns = match &spec.columns {
        Some(columns) if !columns.is_empty() => column_list(columns),
        _ => default_screen_columns(),
    };

    Ok(ScreenQuery {
        recipe: filter.recipe,
        params: QueryParameters {
            view: SCREEN_VIEW,
            filter: Some(filter.filter_string()),
            sort: Some(sort_param(sort_by, spec.sort_order)),
            columns: Some(columns),
            result_cap: clamp_result_cap(spec.max_results),
            tickers: None,
            auth,
        },
    })
}

/// Compiles a fundamentals lookup for one or more tickers.
pub fn compile_fundamentals(
    tickers: &[String],
    auth: Option<&str>,
) -> error::Result<QueryParameters> {
    let auth = require_auth(auth)?;
    let tickers = tickers
        .iter()
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",");

    Ok(QueryParameters {
        view: FUNDAMENTALS_VIEW,
        filter: None,
        sort: None,
        columns: Some(FUNDAMENTALS_COLUMNS.to_string()),
        result_cap: None,
        tickers: Some(tickers),
        auth,
    })
}
