mod common;

use async_trait::async_trait;
use gamekeys_api::{
    catalog::{self, MarketplaceSource, RawListing},
    error::{AppError, AppResult},
};
use sea_orm::EntityTrait;

struct StubSource {
    name: &'static str,
    listings: Vec<RawListing>,
    fail: bool,
}

#[async_trait]
impl MarketplaceSource for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_listings(&self) -> AppResult<Vec<RawListing>> {
        if self.fail {
            return Err(AppError::Gateway(format!("{}: connection refused", self.name)));
        }
        Ok(self.listings.clone())
    }
}

fn listing(title: &str, price_minor: i64, bundle: bool) -> RawListing {
    RawListing {
        title: title.to_string(),
        price_minor,
        currency: "usd".into(),
        discount_percent: 20,
        image_url: None,
        platform: "steam".into(),
        regions: vec!["us".into(), "tr".into()],
        bundle,
        game_pass: false,
        expires_at: None,
    }
}

// Both runs share the single snapshot table, so the whole lifecycle lives in
// one sequential test.
#[tokio::test]
async fn ingestion_replaces_snapshot_and_survives_source_failure() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let first = StubSource {
        name: "first",
        listings: vec![
            listing("Solo Adventure", 1999, false),
            listing("Mega Bundle", 4999, true),
        ],
        fail: false,
    };
    let second = StubSource {
        name: "second",
        listings: vec![listing("Night Racer", 999, false)],
        fail: false,
    };

    let outcome = catalog::run_ingestion(&state.orm, &state.rates, &first, &second).await?;
    assert_eq!(outcome.items, 2);
    assert_eq!(outcome.skipped, 1);

    let rows = gamekeys_api::entity::SaleProducts::find()
        .all(&state.orm)
        .await?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.name.to_lowercase().contains("bundle")));

    // Every row carries a price per requested region, in local currency.
    for row in &rows {
        let prices: Vec<gamekeys_api::models::RegionalPrice> =
            serde_json::from_value(row.regional_prices.clone())?;
        assert_eq!(prices.len(), 2);
        assert!(prices.iter().any(|p| p.region == "us" && p.currency == "usd"));
        assert!(prices.iter().any(|p| p.region == "tr" && p.currency == "try"));
        for price in prices {
            assert!(price.discounted_minor <= price.base_minor);
        }
    }

    // One dead marketplace aborts the whole run before any write, leaving
    // the previous snapshot in place.
    let dead = StubSource {
        name: "dead",
        listings: vec![],
        fail: true,
    };
    let err = catalog::run_ingestion(&state.orm, &state.rates, &first, &dead)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)));

    let after = gamekeys_api::entity::SaleProducts::find()
        .all(&state.orm)
        .await?;
    assert_eq!(after.len(), rows.len());

    // A later healthy run fully replaces the snapshot.
    let replacement = StubSource {
        name: "replacement",
        listings: vec![listing("Fresh Deal", 2999, false)],
        fail: false,
    };
    let outcome =
        catalog::run_ingestion(&state.orm, &state.rates, &replacement, &second).await?;
    assert_eq!(outcome.items, 2);

    let replaced = gamekeys_api::entity::SaleProducts::find()
        .all(&state.orm)
        .await?;
    assert_eq!(replaced.len(), 2);
    assert!(replaced.iter().any(|r| r.name == "Fresh Deal"));
    assert!(!replaced.iter().any(|r| r.name == "Solo Adventure"));

    Ok(())
}
