//! Fixed-order recipes.
//!
//! Some filter combinations must compile to the exact token order the
//! provider's own UI produces. Each recipe has a signature predicate; the
//! first match in `RECIPE_PRIORITY` wins and the generic path picks up every
//! dimension the recipe did not consume.

use super::assemble::{encode_raw, Dimension};
use super::encode::{encode_range, MaxForm, MinForm, RangeConvention};
use super::{EncodeError, EncodeMode, Token};
use crate::domain::{FilterSpec, Recipe, Threshold};

type Signature = fn(&FilterSpec) -> bool;

/// Recipes in priority order.
pub const RECIPE_PRIORITY: [(Recipe, Signature); 4] = [
    (Recipe::VolumeSurge, volume_surge_signature),
    (Recipe::EarningsAfterhours, earnings_afterhours_signature),
    (Recipe::EarningsTrading, earnings_trading_signature),
    (Recipe::Uptrend, uptrend_signature),
];

const RELATIVE_VOLUME_OVER: RangeConvention =
    RangeConvention::new("sh_relvol", MinForm::Over, MaxForm::OpenRange);
const AVG_VOLUME_OPEN: RangeConvention =
    RangeConvention::new("sh_avgvol", MinForm::OpenRange, MaxForm::OpenRange);
const PRICE_OPEN: RangeConvention =
    RangeConvention::new("sh_price", MinForm::OpenRange, MaxForm::OpenRange);

fn hinted(spec: &FilterSpec, recipe: Recipe) -> bool {
    spec.recipe_hint == Some(recipe)
}

fn is_cap(spec: &FilterSpec, bucket: &str) -> bool {
    spec.market_cap
        .as_deref()
        .is_some_and(|cap| cap.trim().eq_ignore_ascii_case(bucket))
}

fn volume_surge_signature(spec: &FilterSpec) -> bool {
    hinted(spec, Recipe::VolumeSurge)
        || (is_cap(spec, "smallover")
            && spec.relative_volume_min.is_some()
            && spec.stocks_only
            && spec.price_change_min.as_ref().and_then(Threshold::as_number) == Some(2.0))
}

fn earnings_afterhours_signature(spec: &FilterSpec) -> bool {
    let keyword = spec
        .earnings_date
        .as_ref()
        .and_then(|d| d.as_single())
        .map(str::trim);
    hinted(spec, Recipe::EarningsAfterhours)
        || (matches!(keyword, Some("today_after" | "thisweek"))
            && (spec.afterhours_change_min.is_some() || spec.price_change_min.is_some()))
}

fn earnings_trading_signature(spec: &FilterSpec) -> bool {
    hinted(spec, Recipe::EarningsTrading)
}

fn uptrend_signature(spec: &FilterSpec) -> bool {
    hinted(spec, Recipe::Uptrend) || (is_cap(spec, "microover") && spec.near_52w_high.is_some())
}

/// First recipe whose signature matches.
pub fn select_recipe(spec: &FilterSpec) -> Option<Recipe> {
    RECIPE_PRIORITY
        .iter()
        .find(|(_, signature)| signature(spec))
        .map(|(recipe, _)| *recipe)
}

/// Sort applied when the caller gave none.
pub fn default_sort(recipe: Recipe) -> &'static str {
    match recipe {
        Recipe::VolumeSurge => "price_change",
        Recipe::EarningsAfterhours => "afterhours_change",
        Recipe::EarningsTrading => "eps_surprise",
        Recipe::Uptrend => "eps_growth_yoy",
    }
}

/// Tokens a recipe emitted, plus every dimension it accounted for.
#[derive(Debug, Clone, Default)]
pub struct RecipeTokens {
    pub tokens: Vec<Token>,
    pub consumed: Vec<Dimension>,
}

struct Builder<'a> {
    spec: &'a FilterSpec,
    mode: EncodeMode,
    out: RecipeTokens,
}

impl<'a> Builder<'a> {
    fn new(spec: &'a FilterSpec, mode: EncodeMode) -> Self {
        Self {
            spec,
            mode,
            out: RecipeTokens::default(),
        }
    }

    fn push(
        &mut self,
        dimension: Dimension,
        outcome: Result<Option<Token>, EncodeError>,
    ) -> Result<&mut Self, EncodeError> {
        self.out.consumed.push(dimension);
        if let Some(token) = self.mode.settle(dimension.name(), outcome)? {
            self.out.tokens.push(token);
        }
        Ok(self)
    }

    fn generic(&mut self, dimension: Dimension) -> Result<&mut Self, EncodeError> {
        let outcome = encode_raw(dimension, self.spec, self.mode);
        self.push(dimension, outcome)
    }

    /// Marks a dimension as handled without emitting anything.
    fn absorb(&mut self, dimension: Dimension) -> &mut Self {
        self.out.consumed.push(dimension);
        self
    }
}

/// Emits a recipe's tokens in its fixed order.
pub fn build_recipe(
    recipe: Recipe,
    spec: &FilterSpec,
    mode: EncodeMode,
) -> Result<RecipeTokens, EncodeError> {
    use Dimension as D;

    let mut b = Builder::new(spec, mode);
    match recipe {
        Recipe::VolumeSurge => {
            let relvol = encode_range(
                &RELATIVE_VOLUME_OVER,
                spec.relative_volume_min.as_ref(),
                spec.relative_volume_max.as_ref(),
            );
            b.generic(D::MarketCap)?
                .generic(D::StocksOnly)?
                .generic(D::AvgVolume)?
                .generic(D::Price)?
                .push(D::RelativeVolume, relvol)?
                .generic(D::PriceChange)?
                .generic(D::Sma200)?;
        }
        Recipe::EarningsAfterhours => {
            if spec.afterhours_change_min.is_some() {
                b.generic(D::AfterhoursChange)?;
            } else {
                b.generic(D::PriceChange)?;
            }
            b.generic(D::MarketCap)?
                .generic(D::EarningsDate)?
                .generic(D::AvgVolume)?
                .generic(D::Price)?
                .absorb(D::StocksOnly);
        }
        Recipe::EarningsTrading => {
            b.generic(D::MarketCap)?
                .generic(D::EarningsRecent)?
                .generic(D::EpsRevisionPositive)?
                .generic(D::AvgVolume)?
                .generic(D::Price)?
                .generic(D::PriceChangePositive)?
                .generic(D::Performance4wRange)?
                .generic(D::Volatility)?
                .absorb(D::StocksOnly);
        }
        Recipe::Uptrend => {
            let avg_volume = encode_range(
                &AVG_VOLUME_OPEN,
                spec.avg_volume_min.as_ref(),
                spec.avg_volume_max.as_ref(),
            );
            let price = encode_range(&PRICE_OPEN, spec.price_min.as_ref(), spec.price_max.as_ref());
            b.generic(D::MarketCap)?
                .push(D::AvgVolume, avg_volume)?
                .push(D::Price, price)?
                .generic(D::Near52wHigh)?
                .generic(D::Performance4wPositive)?
                .generic(D::Sma20)?
                .generic(D::Sma200)?
                .generic(D::Sma50OverSma200)?
                .absorb(D::StocksOnly);
        }
    }
    Ok(b.out)
}
