mod common;

use chrono::Utc;
use gamekeys_api::{
    entity::{SaleProducts, sale_products::ActiveModel as SaleActive},
    error::AppError,
    models::RegionalPrice,
    pricing::Price,
    routes::params::{Pagination, SaleQuery},
    services::sale_service,
};
use sea_orm::ActiveValue::Set;
use sea_orm::EntityTrait;
use uuid::Uuid;

async fn seed_sale(
    state: &gamekeys_api::state::AppState,
    name: &str,
    regions: &[(&str, &str)],
) -> anyhow::Result<()> {
    let prices: Vec<RegionalPrice> = regions
        .iter()
        .map(|(region, currency)| RegionalPrice::new(region, Price::new(1000, currency), 10))
        .collect();
    SaleProducts::insert(SaleActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        discount_percent: Set(10),
        image_url: Set(None),
        category: Set("steam".into()),
        regional_prices: Set(serde_json::to_value(&prices)?),
        expires_at: Set(None),
        created_at: Set(Utc::now().into()),
    })
    .exec(&state.orm)
    .await?;
    Ok(())
}

fn query(region: Option<&str>, page: Option<i64>, per_page: Option<i64>) -> SaleQuery {
    SaleQuery {
        pagination: Pagination { page, per_page },
        category: None,
        region: region.map(str::to_string),
    }
}

// Rows without the requested region must not count toward the total or eat
// page slots.
#[tokio::test]
async fn region_filter_counts_and_pages_only_matching_products() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    SaleProducts::delete_many().exec(&state.orm).await?;
    seed_sale(&state, "Priced Everywhere", &[("us", "usd"), ("tr", "try")]).await?;
    seed_sale(&state, "Turkey Only", &[("tr", "try")]).await?;
    seed_sale(&state, "States Only", &[("us", "usd")]).await?;

    let resp = sale_service::list_sales(&state, query(Some("us"), None, None)).await?;
    let meta = resp.meta.clone().unwrap();
    let items = resp.data.unwrap().items;
    assert_eq!(meta.total, Some(2));
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item.regional_prices.len(), 1);
        assert_eq!(item.regional_prices[0].region, "us");
    }

    // Page size 1 walks exactly the two matching products; no page shrinks
    // because a non-matching row occupied its slot.
    let first = sale_service::list_sales(&state, query(Some("us"), Some(1), Some(1))).await?;
    let second = sale_service::list_sales(&state, query(Some("us"), Some(2), Some(1))).await?;
    let third = sale_service::list_sales(&state, query(Some("us"), Some(3), Some(1))).await?;
    assert_eq!(first.data.unwrap().items.len(), 1);
    assert_eq!(second.data.unwrap().items.len(), 1);
    assert!(third.data.unwrap().items.is_empty());

    // Unknown region codes are rejected at the boundary.
    let err = sale_service::list_sales(&state, query(Some("br"), None, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedRegion(_)));

    Ok(())
}
