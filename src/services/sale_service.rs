use chrono::Utc;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};

use crate::{
    audit::log_audit,
    dto::sales::SaleList,
    entity::sale_products::{Column as SaleCol, Entity as SaleProducts, Model as SaleModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{RegionalPrice, SaleProduct},
    pricing::Region,
    response::{ApiResponse, Meta},
    routes::admin::{RateEntry, RateList, SetRateRequest},
    routes::params::SaleQuery,
    state::AppState,
};

/// Read the current ingestion snapshot, optionally narrowed by category
/// (platform tag) and region. With a region filter only products priced for
/// that region are returned, and each keeps just that region's price.
///
/// The region lives inside the JSON price list, so it is applied after the
/// category query and BEFORE counting and paging; the snapshot is bounded by
/// one ingestion run, which keeps the full scan cheap.
pub async fn list_sales(state: &AppState, query: SaleQuery) -> AppResult<ApiResponse<SaleList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let region = query
        .region
        .as_deref()
        .map(Region::from_code)
        .transpose()?;

    let mut condition = Condition::all();
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(SaleCol::Category.eq(category.to_lowercase()));
    }

    let rows = SaleProducts::find()
        .filter(condition)
        .order_by_desc(SaleCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut matching = Vec::with_capacity(rows.len());
    for row in rows {
        let mut product = sale_from_entity(row)?;
        if let Some(region) = region {
            product
                .regional_prices
                .retain(|price| price.region == region.as_str());
            if product.regional_prices.is_empty() {
                continue;
            }
        }
        matching.push(product);
    }

    let total = matching.len() as i64;
    let items = matching
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Sales", SaleList { items }, Some(meta)))
}

pub async fn set_rate(
    state: &AppState,
    user: &AuthUser,
    payload: SetRateRequest,
) -> AppResult<ApiResponse<RateEntry>> {
    ensure_admin(user)?;
    if !(payload.rate.is_finite() && payload.rate > 0.0) {
        return Err(AppError::BadRequest("rate must be a positive number".into()));
    }
    if payload.from.trim().is_empty() || payload.to.trim().is_empty() {
        return Err(AppError::BadRequest("currency codes must not be empty".into()));
    }

    state.rates.set_rate(&payload.from, &payload.to, payload.rate);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "rate_upsert",
        Some("exchange_rates"),
        Some(serde_json::json!({ "from": payload.from, "to": payload.to, "rate": payload.rate })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let entry = RateEntry {
        pair: format!(
            "{}/{}",
            payload.from.to_lowercase(),
            payload.to.to_lowercase()
        ),
        rate: payload.rate,
    };
    Ok(ApiResponse::success("Rate stored", entry, Some(Meta::empty())))
}

pub async fn list_rates(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<RateList>> {
    ensure_admin(user)?;
    let mut items: Vec<RateEntry> = state
        .rates
        .snapshot()
        .into_iter()
        .map(|(pair, rate)| RateEntry { pair, rate })
        .collect();
    items.sort_by(|a, b| a.pair.cmp(&b.pair));

    Ok(ApiResponse::success("Rates", RateList { items }, None))
}

fn sale_from_entity(model: SaleModel) -> AppResult<SaleProduct> {
    let regional_prices: Vec<RegionalPrice> = serde_json::from_value(model.regional_prices)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt regional prices: {e}")))?;
    Ok(SaleProduct {
        id: model.id,
        name: model.name,
        discount_percent: model.discount_percent,
        image_url: model.image_url,
        category: model.category,
        regional_prices,
        expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    })
}
