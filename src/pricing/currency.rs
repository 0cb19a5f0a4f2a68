use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{AppError, AppResult};
use crate::pricing::Price;

/// Exchange rates stored as directed "from/to" pairs. Updated by the admin
/// endpoint, read on every conversion. No staleness tracking.
#[derive(Clone)]
pub struct RateTable {
    rates: Arc<RwLock<HashMap<String, f64>>>,
}

fn pair_key(from: &str, to: &str) -> String {
    format!("{}/{}", from.to_lowercase(), to.to_lowercase())
}

impl RateTable {
    pub fn new() -> Self {
        Self {
            rates: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Startup seed; overwritten by admin updates as markets move.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        table.set_rate("usd", "try", 41.0);
        table.set_rate("usd", "ars", 1450.0);
        table.set_rate("eur", "usd", 1.08);
        table
    }

    pub fn set_rate(&self, from: &str, to: &str, rate: f64) {
        let mut rates = self.rates.write().unwrap_or_else(|p| p.into_inner());
        rates.insert(pair_key(from, to), rate);
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.rates
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Convert a price into `to_currency`. Identity when the currencies
    /// match; otherwise uses the direct pair, or the reverse pair inverted.
    /// No triangulation through a third currency is attempted.
    pub fn convert(&self, price: &Price, to_currency: &str) -> AppResult<Price> {
        let to = to_currency.to_lowercase();
        if price.currency == to {
            return Ok(price.clone());
        }

        let rates = self.rates.read().unwrap_or_else(|p| p.into_inner());
        if let Some(rate) = rates.get(&pair_key(&price.currency, &to)) {
            let amount = (price.amount_minor as f64 * rate).round() as i64;
            return Ok(Price::new(amount, &to));
        }
        if let Some(rate) = rates.get(&pair_key(&to, &price.currency)) {
            let amount = (price.amount_minor as f64 / rate).round() as i64;
            return Ok(Price::new(amount, &to));
        }

        Err(AppError::RateNotFound {
            from: price.currency.clone(),
            to,
        })
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_same_currency_is_identity() {
        let table = RateTable::new();
        let price = Price::new(1999, "usd");
        let converted = table.convert(&price, "USD").unwrap();
        assert_eq!(converted, price);
    }

    #[test]
    fn convert_uses_direct_rate() {
        let table = RateTable::new();
        table.set_rate("usd", "try", 40.0);
        let converted = table.convert(&Price::new(100, "usd"), "try").unwrap();
        assert_eq!(converted, Price::new(4000, "try"));
    }

    #[test]
    fn convert_inverts_reverse_pair_when_direct_is_missing() {
        let table = RateTable::new();
        table.set_rate("usd", "try", 40.0);
        // Only usd/try stored; try -> usd must divide.
        let converted = table.convert(&Price::new(4000, "try"), "usd").unwrap();
        assert_eq!(converted, Price::new(100, "usd"));
    }

    #[test]
    fn convert_fails_without_either_pair() {
        let table = RateTable::new();
        let err = table.convert(&Price::new(100, "usd"), "jpy").unwrap_err();
        assert!(matches!(err, AppError::RateNotFound { .. }));
    }

    #[test]
    fn no_triangulation_through_third_currency() {
        let table = RateTable::new();
        table.set_rate("usd", "eur", 0.9);
        table.set_rate("eur", "try", 45.0);
        // usd -> try is derivable through eur, but the converter refuses.
        let err = table.convert(&Price::new(100, "usd"), "try").unwrap_err();
        assert!(matches!(err, AppError::RateNotFound { .. }));
    }
}
