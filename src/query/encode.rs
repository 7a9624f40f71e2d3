//! Numeric rendering and the generic threshold/range encoder.
//!
//! Dimensions disagree on how a one-sided bound is written (`sh_price_o10`
//! vs `sh_volume_10to`), so each dimension carries its own `RangeConvention`.

use std::sync::LazyLock;

use regex::Regex;

use super::{EncodeError, Token};
use crate::domain::Threshold;

static PRESET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ou]-?\d+(\.\d+)?$").expect("preset regex"));

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+(\.\d+)?to(-?\d+(\.\d+)?)?|to-?\d+(\.\d+)?)$").expect("range regex")
});

/// Renders a number the way the provider's grammar spells it.
///
/// Integral values drop the decimal point (`10.0` -> `10`); everything else
/// uses the shortest representation that round-trips (`1.5`, `20.11`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// `o5`, `u10`, `o-2.5`.
pub fn is_preset(value: &str) -> bool {
    PRESET_RE.is_match(value)
}

/// `10to20`, `10to`, `to20`.
pub fn is_range_literal(value: &str) -> bool {
    RANGE_RE.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinForm {
    /// `o<min>`
    Over,
    /// `u<min>`
    Up,
    /// `<min>to`
    OpenRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxForm {
    /// `u<max>`
    Under,
    /// `to<max>`
    OpenRange,
}

/// How one dimension writes its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeConvention {
    pub prefix: &'static str,
    pub min: MinForm,
    pub max: MaxForm,
}

impl RangeConvention {
    pub const fn new(prefix: &'static str, min: MinForm, max: MaxForm) -> Self {
        Self { prefix, min, max }
    }

    fn render_min(&self, value: f64) -> String {
        let v = format_number(value);
        match self.min {
            MinForm::Over => format!("o{v}"),
            MinForm::Up => format!("u{v}"),
            MinForm::OpenRange => format!("{v}to"),
        }
    }

    fn render_max(&self, value: f64) -> String {
        let v = format_number(value);
        match self.max {
            MaxForm::Under => format!("u{v}"),
            MaxForm::OpenRange => format!("to{v}"),
        }
    }
}

pub const PRICE: RangeConvention = RangeConvention::new("sh_price", MinForm::Over, MaxForm::Under);
pub const VOLUME: RangeConvention =
    RangeConvention::new("sh_volume", MinForm::OpenRange, MaxForm::OpenRange);
pub const RELATIVE_VOLUME: RangeConvention =
    RangeConvention::new("sh_relvol", MinForm::OpenRange, MaxForm::OpenRange);
pub const PRICE_CHANGE: RangeConvention =
    RangeConvention::new("ta_change", MinForm::Up, MaxForm::OpenRange);
pub const RSI: RangeConvention =
    RangeConvention::new("ta_rsi", MinForm::OpenRange, MaxForm::OpenRange);
pub const PE: RangeConvention = RangeConvention::new("fa_pe", MinForm::OpenRange, MaxForm::OpenRange);
pub const DIVIDEND_YIELD: RangeConvention =
    RangeConvention::new("fa_div", MinForm::OpenRange, MaxForm::OpenRange);
pub const MARKET_CAP_RANGE: RangeConvention =
    RangeConvention::new("cap", MinForm::OpenRange, MaxForm::OpenRange);

/// One side of a range after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// Provider shorthand, emitted verbatim.
    Preset(String),
    Number(f64),
}

impl Bound {
    pub fn number(&self) -> Option<f64> {
        match self {
            Bound::Number(v) => Some(*v),
            Bound::Preset(_) => None,
        }
    }
}

/// Classifies a threshold as pass-through shorthand or a plain number.
pub fn classify(threshold: &Threshold) -> Result<Bound, EncodeError> {
    match threshold {
        Threshold::Value(v) if v.is_finite() => Ok(Bound::Number(*v)),
        Threshold::Value(v) => Err(EncodeError::NonFinite(*v)),
        Threshold::Preset(raw) => {
            let s = raw.trim();
            if is_preset(s) || is_range_literal(s) {
                Ok(Bound::Preset(s.to_string()))
            } else if let Some(v) = s.parse::<f64>().ok().filter(|v| v.is_finite()) {
                Ok(Bound::Number(v))
            } else {
                Err(EncodeError::MalformedPreset(raw.clone()))
            }
        }
    }
}

/// Classifies both sides; a preset on either side short-circuits.
pub fn classify_pair(
    min: Option<&Threshold>,
    max: Option<&Threshold>,
) -> Result<(Option<Bound>, Option<Bound>), EncodeError> {
    let min = min.map(classify).transpose()?;
    let max = max.map(classify).transpose()?;
    Ok((min, max))
}

/// Generic encoder for a scalar dimension with optional bounds.
///
/// A preset in the min slot wins, then a preset in the max slot; otherwise
/// both numbers give `<min>to<max>` and a single number follows `conv`.
pub fn encode_range(
    conv: &RangeConvention,
    min: Option<&Threshold>,
    max: Option<&Threshold>,
) -> Result<Option<Token>, EncodeError> {
    let (min, max) = classify_pair(min, max)?;
    if let Some(Bound::Preset(p)) = &min {
        return Ok(Some(Token::new(conv.prefix, p)));
    }
    if let Some(Bound::Preset(p)) = &max {
        return Ok(Some(Token::new(conv.prefix, p)));
    }

    let lo = min.as_ref().and_then(Bound::number);
    let hi = max.as_ref().and_then(Bound::number);
    let value = match (lo, hi) {
        (Some(lo), Some(hi)) => format!("{}to{}", format_number(lo), format_number(hi)),
        (Some(lo), None) => conv.render_min(lo),
        (None, Some(hi)) => conv.render_max(hi),
        (None, None) => return Ok(None),
    };
    Ok(Some(Token::new(conv.prefix, &value)))
}

/// Numeric-only variant of `encode_range`.
pub fn encode_numeric_range(
    conv: &RangeConvention,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Option<Token>, EncodeError> {
    let min = min.map(Threshold::Value);
    let max = max.map(Threshold::Value);
    encode_range(conv, min.as_ref(), max.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(min: Option<Threshold>, max: Option<Threshold>) -> Option<String> {
        encode_range(&PRICE, min.as_ref(), max.as_ref())
            .unwrap()
            .map(|t| t.to_string())
    }

    #[test]
    fn renders_integral_floats_without_decimal_point() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(20.11), "20.11");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn price_range_conventions() {
        assert_eq!(
            price(Some(10.5.into()), Some(20.11.into())).as_deref(),
            Some("sh_price_10.5to20.11")
        );
        assert_eq!(price(Some(5.0.into()), None).as_deref(), Some("sh_price_o5"));
        assert_eq!(price(None, Some(100.0.into())).as_deref(), Some("sh_price_u100"));
        assert_eq!(price(None, None), None);
    }

    #[test]
    fn presets_pass_through_unchanged() {
        assert_eq!(price(Some("o5".into()), None).as_deref(), Some("sh_price_o5"));
        assert_eq!(price(None, Some("u10".into())).as_deref(), Some("sh_price_u10"));
        assert_eq!(
            price(Some("10to20".into()), None).as_deref(),
            Some("sh_price_10to20")
        );
    }

    #[test]
    fn min_preset_wins_over_max() {
        assert_eq!(
            price(Some("o5".into()), Some("u10".into())).as_deref(),
            Some("sh_price_o5")
        );
        assert_eq!(
            price(Some(3.0.into()), Some("u10".into())).as_deref(),
            Some("sh_price_u10")
        );
    }

    #[test]
    fn numeric_strings_are_numbers() {
        assert_eq!(price(Some("12".into()), None).as_deref(), Some("sh_price_o12"));
    }

    #[test]
    fn malformed_presets_are_errors() {
        let bad = Threshold::from("over nine");
        assert_eq!(
            encode_range(&PRICE, Some(&bad), None),
            Err(EncodeError::MalformedPreset("over nine".into()))
        );
        let nan = Threshold::Value(f64::NAN);
        assert!(matches!(
            encode_range(&PRICE, Some(&nan), None),
            Err(EncodeError::NonFinite(_))
        ));
    }

    #[test]
    fn open_range_dimensions() {
        let t = |min: Option<f64>, max: Option<f64>| {
            encode_numeric_range(&RSI, min, max)
                .unwrap()
                .map(|t| t.to_string())
        };
        assert_eq!(t(Some(30.0), None).as_deref(), Some("ta_rsi_30to"));
        assert_eq!(t(None, Some(70.0)).as_deref(), Some("ta_rsi_to70"));
        assert_eq!(t(Some(30.0), Some(70.0)).as_deref(), Some("ta_rsi_30to70"));
    }

    #[test]
    fn price_change_min_uses_up_form() {
        let token = encode_numeric_range(&PRICE_CHANGE, Some(2.0), None).unwrap();
        assert_eq!(token.unwrap().as_str(), "ta_change_u2");
        let token = encode_numeric_range(&PRICE_CHANGE, None, Some(-1.0)).unwrap();
        assert_eq!(token.unwrap().as_str(), "ta_change_to-1");
    }

    #[test]
    fn recognizes_shorthand() {
        assert!(is_preset("o5"));
        assert!(is_preset("u0.5"));
        assert!(!is_preset("x5"));
        assert!(is_range_literal("10to20"));
        assert!(is_range_literal("to20"));
        assert!(is_range_literal("10to"));
        assert!(!is_range_literal("to"));
    }
}
