use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pricing::Price;

/// Who owns a piece of cart/wishlist state: an authenticated user or an
/// anonymous browser session.
#[derive(Debug, Clone)]
pub enum Owner {
    User(Uuid),
    Session(String),
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

/// Discriminated order kind; the payload differs per kind.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderKind {
    GameKey { platform: String },
    GiftCard { value_minor: i64 },
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub status: String,
    pub payment_status: String,
    pub invoice_number: String,
    pub address: String,
    pub kind: OrderKind,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

/// A product's price localized to one region. Both amounts share the
/// region's currency and the discounted amount never exceeds the base.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionalPrice {
    pub region: String,
    pub currency: String,
    pub base_minor: i64,
    pub discounted_minor: i64,
}

impl RegionalPrice {
    /// Derives the discounted amount from the base price; the discount is
    /// clamped to 0..=100 so the invariant holds by construction.
    pub fn new(region: &str, base: Price, discount_percent: i32) -> Self {
        let discount = i64::from(discount_percent.clamp(0, 100));
        let discounted = base.amount_minor - base.amount_minor * discount / 100;
        Self {
            region: region.to_string(),
            currency: base.currency.clone(),
            base_minor: base.amount_minor,
            discounted_minor: discounted,
        }
    }
}

/// One entry of the ingested sales catalog snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SaleProduct {
    pub id: Uuid,
    pub name: String,
    pub discount_percent: i32,
    pub image_url: Option<String>,
    pub category: String,
    pub regional_prices: Vec<RegionalPrice>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regional_price_discount_never_exceeds_base() {
        let price = RegionalPrice::new("us", Price::new(1000, "usd"), 30);
        assert_eq!(price.base_minor, 1000);
        assert_eq!(price.discounted_minor, 700);
        assert!(price.discounted_minor <= price.base_minor);
        assert_eq!(price.currency, "usd");
    }

    #[test]
    fn regional_price_clamps_out_of_range_discounts() {
        let over = RegionalPrice::new("us", Price::new(1000, "usd"), 150);
        assert_eq!(over.discounted_minor, 0);
        let under = RegionalPrice::new("us", Price::new(1000, "usd"), -10);
        assert_eq!(under.discounted_minor, 1000);
    }
}
