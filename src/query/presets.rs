//! Dimension-specific encoders backed by lookup tables.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

use super::encode::{classify_pair, format_number, is_range_literal, Bound};
use super::{EncodeError, EncodeMode, Token};
use crate::domain::{EarningsDate, Threshold};

/// Named market-cap buckets accepted verbatim.
pub const MARKET_CAP_BUCKETS: &[&str] = &[
    "mega",
    "large",
    "mid",
    "small",
    "micro",
    "nano",
    "largeover",
    "midover",
    "smallover",
    "microover",
    "largeunder",
    "midunder",
    "smallunder",
    "microunder",
];

/// Display name -> provider code.
pub const SECTORS: &[(&str, &str)] = &[
    ("Basic Materials", "basicmaterials"),
    ("Communication Services", "communicationservices"),
    ("Consumer Cyclical", "consumercyclical"),
    ("Consumer Defensive", "consumerdefensive"),
    ("Energy", "energy"),
    ("Financial Services", "financial"),
    ("Healthcare", "healthcare"),
    ("Industrials", "industrials"),
    ("Real Estate", "realestate"),
    ("Technology", "technology"),
    ("Utilities", "utilities"),
];

/// Symbolic keyword -> provider keyword.
pub const EARNINGS_KEYWORDS: &[(&str, &str)] = &[
    ("today", "today"),
    ("today_before", "todaybefore"),
    ("today_after", "todayafter"),
    ("tomorrow", "tomorrow"),
    ("tomorrow_before", "tomorrowbefore"),
    ("tomorrow_after", "tomorrowafter"),
    ("yesterday", "yesterday"),
    ("yesterday_before", "yesterdaybefore"),
    ("yesterday_after", "yesterdayafter"),
    ("next_5_days", "nextdays5"),
    ("within_2_weeks", "nextdays5"),
    ("this_week", "thisweek"),
    ("next_week", "nextweek"),
    ("prev_week", "prevweek"),
    ("this_month", "thismonth"),
];

/// Average-volume ladder in thousands of shares, descending.
pub const VOLUME_LADDER_K: [u32; 10] = [2000, 1000, 750, 500, 400, 300, 200, 100, 50, 0];

const PROVIDER_DATE: &str = "%m-%d-%Y";
const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"];

static NATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("date regex"));

pub fn encode_market_cap(value: &str) -> Result<Option<Token>, EncodeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let lower = trimmed.to_ascii_lowercase();
    if MARKET_CAP_BUCKETS.contains(&lower.as_str()) {
        return Ok(Some(Token::new("cap", &lower)));
    }
    if is_range_literal(trimmed) {
        return Ok(Some(Token::new("cap", trimmed)));
    }
    Err(EncodeError::UnknownMarketCap(value.to_string()))
}

/// Provider code for a sector given by display name or code, any case.
pub fn sector_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    SECTORS
        .iter()
        .find(|(display, code)| display.eq_ignore_ascii_case(name) || code.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// `sec_<code>|<code>...`
///
/// In lenient mode unknown sectors are dropped one by one; strict mode fails
/// on the first.
pub fn encode_sectors(sectors: &[String], mode: EncodeMode) -> Result<Option<Token>, EncodeError> {
    let mut codes = Vec::with_capacity(sectors.len());
    for sector in sectors {
        match sector_code(sector) {
            Some(code) => codes.push(code),
            None if mode == EncodeMode::Strict => {
                return Err(EncodeError::UnknownSector(sector.clone()));
            }
            None => warn!(sector = %sector, "dropping unknown sector"),
        }
    }
    if codes.is_empty() {
        return Ok(None);
    }
    Ok(Some(Token::new("sec", &codes.join("|"))))
}

/// Provider keyword for a symbolic or native keyword.
pub fn earnings_keyword(value: &str) -> Option<&'static str> {
    let value = value.trim();
    EARNINGS_KEYWORDS
        .iter()
        .find(|(symbolic, native)| *symbolic == value || *native == value)
        .map(|(_, native)| *native)
}

/// Normalizes a calendar date to `MM-DD-YYYY`.
pub fn provider_date(value: &str) -> Result<String, EncodeError> {
    let value = value.trim();
    if NATIVE_DATE_RE.is_match(value) {
        return Ok(value.to_string());
    }
    DATE_INPUTS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .map(|date| date.format(PROVIDER_DATE).to_string())
        .ok_or_else(|| EncodeError::InvalidDate(value.to_string()))
}

/// Encodes an earnings-date filter.
///
/// Keyword lists put the prefix on the first keyword only:
/// `earningsdate_todayafter|tomorrowbefore`.
pub fn encode_earnings_date(
    value: &EarningsDate,
    mode: EncodeMode,
) -> Result<Option<Token>, EncodeError> {
    match value {
        EarningsDate::Range { start, end } => {
            let start = provider_date(start)?;
            let end = provider_date(end)?;
            Ok(Some(Token::new("earningsdate", &format!("{start}x{end}"))))
        }
        EarningsDate::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if let Some(keyword) = earnings_keyword(text) {
                Ok(Some(Token::new("earningsdate", keyword)))
            } else if text.contains('x') {
                Ok(Some(Token::new("earningsdate", text)))
            } else {
                Err(EncodeError::UnknownEarningsKeyword(text.to_string()))
            }
        }
        EarningsDate::Keywords(list) => {
            let mut resolved = Vec::with_capacity(list.len());
            for item in list {
                match earnings_keyword(item) {
                    Some(keyword) => resolved.push(keyword),
                    None if mode == EncodeMode::Strict => {
                        return Err(EncodeError::UnknownEarningsKeyword(item.clone()));
                    }
                    None => warn!(keyword = %item, "dropping unknown earnings keyword"),
                }
            }
            if resolved.is_empty() {
                return Ok(None);
            }
            Ok(Some(Token::new("earningsdate", &resolved.join("|"))))
        }
    }
}

/// Snaps a share count to the first ladder step it meets, in thousands.
pub fn volume_bucket(shares: f64) -> u32 {
    let thousands = shares / 1000.0;
    VOLUME_LADDER_K
        .iter()
        .copied()
        .find(|&step| thousands >= f64::from(step))
        .unwrap_or(0)
}

/// `sh_avgvol_*`: a numeric minimum goes through the ladder, everything else
/// is written in thousands.
pub fn encode_avg_volume(
    min: Option<&Threshold>,
    max: Option<&Threshold>,
) -> Result<Option<Token>, EncodeError> {
    let (min, max) = classify_pair(min, max)?;
    if let Some(Bound::Preset(p)) = &min {
        return Ok(Some(Token::new("sh_avgvol", p)));
    }
    if let Some(Bound::Preset(p)) = &max {
        return Ok(Some(Token::new("sh_avgvol", p)));
    }

    let lo = min.as_ref().and_then(Bound::number);
    let hi = max.as_ref().and_then(Bound::number);
    let value = match (lo, hi) {
        (Some(lo), Some(hi)) => format!(
            "{}to{}",
            format_number(lo / 1000.0),
            format_number(hi / 1000.0)
        ),
        (Some(lo), None) => format!("o{}", volume_bucket(lo)),
        (None, Some(hi)) => format!("to{}", format_number(hi / 1000.0)),
        (None, None) => return Ok(None),
    };
    Ok(Some(Token::new("sh_avgvol", &value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_cap_buckets_and_literals() {
        assert_eq!(
            encode_market_cap("smallover").unwrap().unwrap().as_str(),
            "cap_smallover"
        );
        assert_eq!(encode_market_cap("Mega").unwrap().unwrap().as_str(), "cap_mega");
        assert_eq!(encode_market_cap("2to10").unwrap().unwrap().as_str(), "cap_2to10");
        assert_eq!(encode_market_cap("  "), Ok(None));
        assert_eq!(
            encode_market_cap("gigantic"),
            Err(EncodeError::UnknownMarketCap("gigantic".into()))
        );
    }

    #[test]
    fn sectors_or_join_inside_one_token() {
        let sectors = vec!["Technology".to_string(), "healthcare".to_string()];
        let token = encode_sectors(&sectors, EncodeMode::Strict).unwrap().unwrap();
        assert_eq!(token.as_str(), "sec_technology|healthcare");
    }

    #[test]
    fn unknown_sectors_follow_mode() {
        let sectors = vec!["Crypto".to_string(), "Energy".to_string()];
        let token = encode_sectors(&sectors, EncodeMode::Lenient).unwrap().unwrap();
        assert_eq!(token.as_str(), "sec_energy");
        assert_eq!(
            encode_sectors(&sectors, EncodeMode::Strict),
            Err(EncodeError::UnknownSector("Crypto".into()))
        );
    }

    #[test]
    fn keyword_list_prefixes_first_entry_only() {
        let value = EarningsDate::Keywords(vec!["today_after".into(), "tomorrow_before".into()]);
        let token = encode_earnings_date(&value, EncodeMode::Strict).unwrap().unwrap();
        assert_eq!(token.as_str(), "earningsdate_todayafter|tomorrowbefore");
    }

    #[test]
    fn keywords_win_over_range_detection() {
        let next_week = EarningsDate::keyword("next_week");
        let token = encode_earnings_date(&next_week, EncodeMode::Strict).unwrap().unwrap();
        assert_eq!(token.as_str(), "earningsdate_nextweek");

        let joined = EarningsDate::keyword("06-30-2025x07-04-2025");
        let token = encode_earnings_date(&joined, EncodeMode::Strict).unwrap().unwrap();
        assert_eq!(token.as_str(), "earningsdate_06-30-2025x07-04-2025");

        assert_eq!(
            encode_earnings_date(&EarningsDate::keyword("someday"), EncodeMode::Strict),
            Err(EncodeError::UnknownEarningsKeyword("someday".into()))
        );
    }

    #[test]
    fn date_ranges_normalize_each_side() {
        let value = EarningsDate::range("2025-06-30", "07/04/2025");
        let token = encode_earnings_date(&value, EncodeMode::Strict).unwrap().unwrap();
        assert_eq!(token.as_str(), "earningsdate_06-30-2025x07-04-2025");

        assert_eq!(provider_date("06-30-2025").unwrap(), "06-30-2025");
        assert_eq!(provider_date("2025/06/30").unwrap(), "06-30-2025");
        assert_eq!(
            provider_date("June 30"),
            Err(EncodeError::InvalidDate("June 30".into()))
        );
    }

    #[test]
    fn ladder_floor_and_boundaries() {
        assert_eq!(volume_bucket(0.0), 0);
        assert_eq!(volume_bucket(49_999.0), 0);
        assert_eq!(volume_bucket(0.0), volume_bucket(49_999.0));
        for step in VOLUME_LADDER_K.iter().filter(|&&s| s > 0) {
            assert_eq!(volume_bucket(f64::from(*step) * 1000.0), *step);
        }
        assert_eq!(volume_bucket(199_999.0), 100);
        assert_eq!(volume_bucket(5_000_000.0), 2000);
    }

    #[test]
    fn average_volume_forms() {
        let t = |min: Option<Threshold>, max: Option<Threshold>| {
            encode_avg_volume(min.as_ref(), max.as_ref())
                .unwrap()
                .map(|t| t.to_string())
        };
        assert_eq!(t(Some(100_000.0.into()), None).as_deref(), Some("sh_avgvol_o100"));
        assert_eq!(t(Some(120_000.0.into()), None).as_deref(), Some("sh_avgvol_o100"));
        assert_eq!(t(None, Some(500_000.0.into())).as_deref(), Some("sh_avgvol_to500"));
        assert_eq!(
            t(Some(100_000.0.into()), Some(1_500_000.0.into())).as_deref(),
            Some("sh_avgvol_100to1500")
        );
        assert_eq!(t(Some("o2000".into()), None).as_deref(), Some("sh_avgvol_o2000"));
    }
}
