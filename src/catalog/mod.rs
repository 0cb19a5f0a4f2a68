use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    db::OrmConn,
    entity::{SaleProducts, sale_products::ActiveModel as SaleActive},
    error::AppResult,
    models::RegionalPrice,
    pricing::{Platform, RateTable, Region, regional_price},
    uow::{UnitOfWork, map_db_err},
};

pub mod sources;

pub use sources::{GamevaultSource, KeyhubSource, MarketplaceSource, RawListing};

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub items: usize,
    pub skipped: usize,
}

/// One ingestion run: fetch both marketplaces concurrently, price every
/// listing per region, and atomically replace the catalog snapshot.
///
/// Either fetch failing aborts the whole run before any write happens, and
/// the snapshot swap runs inside one transaction, so a failed run leaves the
/// previous catalog fully intact and readers never observe an empty table.
pub async fn run_ingestion(
    orm: &OrmConn,
    rates: &RateTable,
    first: &dyn MarketplaceSource,
    second: &dyn MarketplaceSource,
) -> AppResult<IngestOutcome> {
    let (mut listings, more) =
        tokio::try_join!(first.fetch_listings(), second.fetch_listings())?;
    listings.extend(more);
    tracing::info!(
        sources = ?[first.name(), second.name()],
        fetched = listings.len(),
        "marketplace fetch complete"
    );

    let mut outcome = IngestOutcome::default();
    let mut rows: Vec<SaleActive> = Vec::with_capacity(listings.len());
    let now = Utc::now();

    for listing in listings {
        if listing.is_bundle() {
            outcome.skipped += 1;
            continue;
        }
        let Some(platform) = Platform::from_code(&listing.platform) else {
            tracing::warn!(title = %listing.title, platform = %listing.platform, "unknown platform, skipping listing");
            outcome.skipped += 1;
            continue;
        };

        let base = crate::pricing::Price::new(listing.price_minor, &listing.currency);
        let base_usd = rates.convert(&base, "usd")?;

        let mut regional: Vec<RegionalPrice> = Vec::with_capacity(listing.regions.len());
        for code in &listing.regions {
            let region = Region::from_code(code)?;
            let quote = regional_price(&base_usd, region, platform, listing.game_pass)?;
            let local = rates.convert(&quote, region.currency())?;
            regional.push(RegionalPrice::new(
                region.as_str(),
                local,
                listing.discount_percent,
            ));
        }

        rows.push(SaleActive {
            id: Set(Uuid::new_v4()),
            name: Set(listing.title),
            discount_percent: Set(listing.discount_percent),
            image_url: Set(listing.image_url),
            category: Set(platform.as_str().to_string()),
            regional_prices: Set(serde_json::to_value(&regional)
                .map_err(|err| crate::error::AppError::Internal(anyhow::anyhow!(err)))?),
            expires_at: Set(listing.expires_at.map(Into::into)),
            created_at: Set(now.into()),
        });
        outcome.items += 1;
    }

    // Full-replace snapshot in one transactional scope.
    let uow = UnitOfWork::begin(orm).await?;
    SaleProducts::delete_many()
        .exec(uow.conn())
        .await
        .map_err(map_db_err)?;
    if !rows.is_empty() {
        SaleProducts::insert_many(rows)
            .exec(uow.conn())
            .await
            .map_err(map_db_err)?;
    }
    uow.commit().await?;

    tracing::info!(items = outcome.items, skipped = outcome.skipped, "catalog snapshot replaced");
    Ok(outcome)
}
