use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::sales::SaleList,
    error::AppResult,
    response::ApiResponse,
    routes::params::SaleQuery,
    services::sale_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_sales))
}

#[utoipa::path(
    get,
    path = "/api/sales",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category" = Option<String>, Query, description = "Platform tag: steam, xbox, psn"),
        ("region" = Option<String>, Query, description = "Region code: us, tr, ar")
    ),
    responses(
        (status = 200, description = "List the current sales snapshot", body = ApiResponse<SaleList>),
        (status = 400, description = "Unsupported region"),
    ),
    tag = "Sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<SaleQuery>,
) -> AppResult<Json<ApiResponse<SaleList>>> {
    let resp = sale_service::list_sales(&state, query).await?;
    Ok(Json(resp))
}
