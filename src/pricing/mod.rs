use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod currency;
pub mod regional;

pub use currency::RateTable;
pub use regional::{Platform, Region, regional_price};

/// A monetary amount in minor units (cents) tagged with a lower-case
/// currency code. All price arithmetic in the crate happens in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Price {
    pub amount_minor: i64,
    pub currency: String,
}

impl Price {
    pub fn new(amount_minor: i64, currency: &str) -> Self {
        Self {
            amount_minor,
            currency: currency.to_lowercase(),
        }
    }
}
