use axum::{Json, Router, extract::State, routing::post};

use crate::{
    error::AppResult,
    response::ApiResponse,
    services::payment_service::{self, WebhookPayload},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/payment", post(payment_webhook))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/payment",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Notification processed", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Amount mismatch"),
        (status = 403, description = "Invalid signature"),
        (status = 404, description = "Unknown order"),
        (status = 409, description = "Order already paid"),
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = payment_service::handle_webhook(&state, payload).await?;
    Ok(Json(resp))
}
