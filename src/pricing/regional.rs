use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::pricing::Price;

/// Purchasing regions the storefront prices for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Tr,
    Ar,
}

impl Region {
    pub fn from_code(code: &str) -> AppResult<Self> {
        match code.to_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "tr" => Ok(Region::Tr),
            "ar" => Ok(Region::Ar),
            other => Err(AppError::UnsupportedRegion(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Tr => "tr",
            Region::Ar => "ar",
        }
    }

    /// Local currency for the region, used when converting the final quote.
    pub fn currency(&self) -> &'static str {
        match self {
            Region::Us => "usd",
            Region::Tr => "try",
            Region::Ar => "ars",
        }
    }

    /// Flat regional markdown applied before the bracket lookup.
    fn markdown(&self) -> f64 {
        match self {
            Region::Us => 0.75,
            Region::Tr => 0.60,
            Region::Ar => 0.50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Steam,
    Xbox,
    Psn,
}

impl Platform {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "steam" => Some(Platform::Steam),
            "xbox" => Some(Platform::Xbox),
            "psn" | "playstation" => Some(Platform::Psn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Steam => "steam",
            Platform::Xbox => "xbox",
            Platform::Psn => "psn",
        }
    }

    fn supports_game_pass(&self) -> bool {
        matches!(self, Platform::Xbox)
    }
}

/// Flat addend for listings that carry the subscription add-on, applied
/// before the bracket lookup.
const GAME_PASS_ADDEND_MINOR: i64 = 100;

// Markup brackets. Upper bounds are inclusive and checked in order, so a
// price sitting exactly on a bound belongs to the lower bracket. The final
// entry is the catch-all.
struct PercentTier {
    upto_minor: i64,
    percent: i64,
}

struct AddendTier {
    upto_minor: i64,
    addend_minor: i64,
}

const US_TIERS: &[PercentTier] = &[
    PercentTier { upto_minor: 299, percent: 70 },
    PercentTier { upto_minor: 499, percent: 55 },
    PercentTier { upto_minor: 999, percent: 45 },
    PercentTier { upto_minor: 1999, percent: 35 },
    PercentTier { upto_minor: 2999, percent: 30 },
    PercentTier { upto_minor: 5499, percent: 25 },
];
const US_CATCH_ALL_PERCENT: i64 = 20;

const TR_TIERS: &[PercentTier] = &[
    PercentTier { upto_minor: 199, percent: 90 },
    PercentTier { upto_minor: 399, percent: 70 },
    PercentTier { upto_minor: 799, percent: 55 },
    PercentTier { upto_minor: 1499, percent: 45 },
    PercentTier { upto_minor: 2999, percent: 35 },
];
const TR_CATCH_ALL_PERCENT: i64 = 25;

const AR_TIERS: &[AddendTier] = &[
    AddendTier { upto_minor: 299, addend_minor: 150 },
    AddendTier { upto_minor: 599, addend_minor: 200 },
    AddendTier { upto_minor: 999, addend_minor: 300 },
    AddendTier { upto_minor: 1999, addend_minor: 450 },
    AddendTier { upto_minor: 3999, addend_minor: 600 },
];
const AR_CATCH_ALL_ADDEND: i64 = 800;

fn apply_percent_tiers(amount: i64, tiers: &[PercentTier], catch_all: i64) -> i64 {
    let percent = tiers
        .iter()
        .find(|tier| amount <= tier.upto_minor)
        .map(|tier| tier.percent)
        .unwrap_or(catch_all);
    amount + amount * percent / 100
}

fn apply_addend_tiers(amount: i64, tiers: &[AddendTier], catch_all: i64) -> i64 {
    let addend = tiers
        .iter()
        .find(|tier| amount <= tier.upto_minor)
        .map(|tier| tier.addend_minor)
        .unwrap_or(catch_all);
    amount + addend
}

/// Derive the regional retail price from a base USD price: flat regional
/// markdown, optional game-pass addend, then the region's markup bracket.
/// The result stays in the input currency; conversion to the region's local
/// currency is the converter's job.
pub fn regional_price(
    base: &Price,
    region: Region,
    platform: Platform,
    game_pass: bool,
) -> AppResult<Price> {
    if base.amount_minor < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }

    let mut amount = (base.amount_minor as f64 * region.markdown()).round() as i64;
    if game_pass && platform.supports_game_pass() {
        amount += GAME_PASS_ADDEND_MINOR;
    }

    let amount = match region {
        Region::Us => apply_percent_tiers(amount, US_TIERS, US_CATCH_ALL_PERCENT),
        Region::Tr => apply_percent_tiers(amount, TR_TIERS, TR_CATCH_ALL_PERCENT),
        Region::Ar => apply_addend_tiers(amount, AR_TIERS, AR_CATCH_ALL_ADDEND),
    };

    Ok(Price::new(amount, &base.currency))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Price {
        Price::new(amount, "usd")
    }

    #[test]
    fn unknown_region_code_is_rejected() {
        let err = Region::from_code("br").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedRegion(code) if code == "br"));
    }

    #[test]
    fn us_bracket_markup_matches_table() {
        // $4.00 base -> x0.75 = 300 cents, falls in the (299, 499] bracket: +55%.
        let quote = regional_price(&usd(400), Region::Us, Platform::Steam, false).unwrap();
        assert_eq!(quote.amount_minor, 300 + 300 * 55 / 100);
        assert_eq!(quote.currency, "usd");
    }

    #[test]
    fn boundary_price_belongs_to_lower_bracket() {
        // Marked-down amount is exactly 299 cents, the inclusive upper bound
        // of the first US bracket, so +70% applies rather than +55%.
        let base = usd(399); // 399 * 0.75 = 299.25 -> 299
        let quote = regional_price(&base, Region::Us, Platform::Steam, false).unwrap();
        assert_eq!(quote.amount_minor, 299 + 299 * 70 / 100);
    }

    #[test]
    fn catch_all_bracket_covers_large_prices() {
        // $100 base -> 7500 after markdown, beyond every US tier: +20%.
        let quote = regional_price(&usd(10_000), Region::Us, Platform::Steam, false).unwrap();
        assert_eq!(quote.amount_minor, 7500 + 7500 * 20 / 100);
    }

    #[test]
    fn tr_uses_its_own_tiers() {
        // $5.00 base -> x0.60 = 300 cents, (199, 399] bracket: +70%.
        let quote = regional_price(&usd(500), Region::Tr, Platform::Steam, false).unwrap();
        assert_eq!(quote.amount_minor, 300 + 300 * 70 / 100);
    }

    #[test]
    fn ar_uses_additive_constants() {
        // $10.00 base -> x0.50 = 500 cents, (299, 599] bracket: +200.
        let quote = regional_price(&usd(1000), Region::Ar, Platform::Steam, false).unwrap();
        assert_eq!(quote.amount_minor, 500 + 200);
    }

    #[test]
    fn game_pass_addend_applies_before_bracket_lookup_on_xbox() {
        // 400 * 0.75 = 300, +100 game pass = 400, which lands in the second
        // US bracket (+55%) instead of the first.
        let quote = regional_price(&usd(400), Region::Us, Platform::Xbox, true).unwrap();
        assert_eq!(quote.amount_minor, 400 + 400 * 55 / 100);
    }

    #[test]
    fn game_pass_flag_is_ignored_off_xbox() {
        let with = regional_price(&usd(400), Region::Us, Platform::Steam, true).unwrap();
        let without = regional_price(&usd(400), Region::Us, Platform::Steam, false).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn every_bracket_in_range_yields_its_table_percent() {
        let bounds = [(0, 299, 70), (300, 499, 55), (500, 999, 45)];
        for (lo, hi, pct) in bounds {
            for amount in [lo, (lo + hi) / 2, hi] {
                let expected = amount + amount * pct / 100;
                assert_eq!(
                    apply_percent_tiers(amount, US_TIERS, US_CATCH_ALL_PERCENT),
                    expected,
                    "amount {amount} should take +{pct}%"
                );
            }
        }
    }
}
