use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// A marketplace listing as fetched, before conversion and regional pricing.
#[derive(Debug, Clone)]
pub struct RawListing {
    pub title: String,
    pub price_minor: i64,
    pub currency: String,
    pub discount_percent: i32,
    pub image_url: Option<String>,
    pub platform: String,
    pub regions: Vec<String>,
    pub bundle: bool,
    pub game_pass: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RawListing {
    /// Bundles are excluded from the sales catalog. Some feeds only hint at
    /// it through the title.
    pub fn is_bundle(&self) -> bool {
        self.bundle || self.title.to_lowercase().contains("bundle")
    }
}

#[async_trait]
pub trait MarketplaceSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_listings(&self) -> AppResult<Vec<RawListing>>;
}

fn http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|err| AppError::Internal(anyhow::anyhow!(err)))
}

/// KeyHub exposes a flat `GET /v1/deals` with minor-unit prices.
pub struct KeyhubSource {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct KeyhubDeal {
    name: String,
    price_minor: i64,
    currency: String,
    #[serde(default)]
    discount: i32,
    cover_url: Option<String>,
    platform: String,
    regions: Vec<String>,
    #[serde(default)]
    is_bundle: bool,
    #[serde(default)]
    game_pass: bool,
    ends_at: Option<DateTime<Utc>>,
}

impl KeyhubSource {
    pub fn new(base_url: &str) -> AppResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl MarketplaceSource for KeyhubSource {
    fn name(&self) -> &'static str {
        "keyhub"
    }

    async fn fetch_listings(&self) -> AppResult<Vec<RawListing>> {
        let url = format!("{}/v1/deals?on_sale=true", self.base_url);
        let deals: Vec<KeyhubDeal> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::Gateway(format!("keyhub: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Gateway(format!("keyhub: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::Gateway(format!("keyhub: {err}")))?;

        Ok(deals
            .into_iter()
            .map(|deal| RawListing {
                title: deal.name,
                price_minor: deal.price_minor,
                currency: deal.currency.to_lowercase(),
                discount_percent: deal.discount,
                image_url: deal.cover_url,
                platform: deal.platform,
                regions: deal.regions,
                bundle: deal.is_bundle,
                game_pass: deal.game_pass,
                expires_at: deal.ends_at,
            })
            .collect())
    }
}

/// GameVault wraps its sale feed in an envelope and quotes prices as
/// fractional amounts, so they are scaled to minor units here.
pub struct GamevaultSource {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GamevaultFeed {
    items: Vec<GamevaultItem>,
}

#[derive(Debug, Deserialize)]
struct GamevaultItem {
    title: String,
    amount: f64,
    currency_code: String,
    #[serde(default)]
    discount_percent: i32,
    image: Option<String>,
    category: String,
    #[serde(default)]
    markets: Vec<String>,
    #[serde(default)]
    kind: Option<String>,
    deal_expiry: Option<DateTime<Utc>>,
}

impl GamevaultSource {
    pub fn new(base_url: &str) -> AppResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client()?,
        })
    }
}

#[async_trait]
impl MarketplaceSource for GamevaultSource {
    fn name(&self) -> &'static str {
        "gamevault"
    }

    async fn fetch_listings(&self) -> AppResult<Vec<RawListing>> {
        let url = format!("{}/feed/sales", self.base_url);
        let feed: GamevaultFeed = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| AppError::Gateway(format!("gamevault: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Gateway(format!("gamevault: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::Gateway(format!("gamevault: {err}")))?;

        Ok(feed
            .items
            .into_iter()
            .map(|item| RawListing {
                title: item.title,
                price_minor: (item.amount * 100.0).round() as i64,
                currency: item.currency_code.to_lowercase(),
                discount_percent: item.discount_percent,
                image_url: item.image,
                platform: item.category,
                regions: item.markets,
                bundle: item.kind.as_deref() == Some("bundle"),
                game_pass: false,
                expires_at: item.deal_expiry,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str, bundle: bool) -> RawListing {
        RawListing {
            title: title.to_string(),
            price_minor: 1000,
            currency: "usd".into(),
            discount_percent: 0,
            image_url: None,
            platform: "steam".into(),
            regions: vec!["us".into()],
            bundle,
            game_pass: false,
            expires_at: None,
        }
    }

    #[test]
    fn bundle_detection_uses_flag_and_title() {
        assert!(listing("Shooter Pack", true).is_bundle());
        assert!(listing("Ultimate Bundle Vol. 2", false).is_bundle());
        assert!(!listing("Lone Ranger", false).is_bundle());
    }
}
