use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    error::{AppError, AppResult},
    models::Order,
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub order_id: Uuid,
    pub status: String,
    pub amount_minor: i64,
    /// Hex-encoded HMAC-SHA256 over `"{order_id}:{status}:{amount_minor}"`.
    pub signature: String,
}

fn signed_message(payload: &WebhookPayload) -> String {
    format!(
        "{}:{}:{}",
        payload.order_id, payload.status, payload.amount_minor
    )
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).ok())
        .collect()
}

/// Constant-time signature check via the mac's own verifier.
pub fn verify_signature(secret: &str, payload: &WebhookPayload) -> AppResult<()> {
    let expected = decode_hex(payload.signature.trim()).ok_or(AppError::Forbidden)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    mac.update(signed_message(payload).as_bytes());
    mac.verify_slice(&expected).map_err(|_| AppError::Forbidden)
}

/// Gateway notification entry point. A verified `paid` notification settles
/// the order and sends the confirmation mail; other statuses are logged and
/// acknowledged without side effects.
pub async fn handle_webhook(
    state: &AppState,
    payload: WebhookPayload,
) -> AppResult<ApiResponse<serde_json::Value>> {
    verify_signature(&state.webhook_secret, &payload)?;

    if payload.status != "paid" {
        tracing::info!(
            order_id = %payload.order_id,
            status = %payload.status,
            "ignoring non-settling payment notification"
        );
        return Ok(ApiResponse::success(
            "Acknowledged",
            serde_json::json!({ "order_id": payload.order_id }),
            Some(Meta::empty()),
        ));
    }

    let order = order_service::mark_paid(state, payload.order_id, payload.amount_minor).await?;

    send_confirmation(state, &order).await;

    if let Err(err) = log_audit(
        &state.pool,
        Some(order.user_id),
        "order_paid",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "amount": payload.amount_minor })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        serde_json::json!({ "order_id": order.id, "invoice_number": order.invoice_number }),
        Some(Meta::empty()),
    ))
}

/// Confirmation mail is best effort; a mailer failure never unwinds a
/// settled payment.
async fn send_confirmation(state: &AppState, order: &Order) {
    let email: Option<(String,)> = match sqlx::query_as("SELECT email FROM users WHERE id = $1")
        .bind(order.user_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(row) => row,
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.id, "could not load buyer email");
            return;
        }
    };

    let Some((email,)) = email else {
        tracing::warn!(order_id = %order.id, "order has no matching user");
        return;
    };

    let subject = format!("Order {} confirmed", order.invoice_number);
    let body = format!(
        "Your payment of {} was received. Invoice: {}.",
        order.total_amount, order.invoice_number
    );
    if let Err(err) = state.mailer.send(&email, &subject, &body).await {
        tracing::warn!(error = %err, order_id = %order.id, "confirmation mail failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &WebhookPayload) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_message(payload).as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn payload_with_signature(secret: &str) -> WebhookPayload {
        let mut payload = WebhookPayload {
            order_id: Uuid::new_v4(),
            status: "paid".to_string(),
            amount_minor: 2499,
            signature: String::new(),
        };
        payload.signature = sign(secret, &payload);
        payload
    }

    #[test]
    fn valid_signature_passes() {
        let payload = payload_with_signature("topsecret");
        assert!(verify_signature("topsecret", &payload).is_ok());
    }

    #[test]
    fn wrong_secret_is_forbidden() {
        let payload = payload_with_signature("topsecret");
        assert!(matches!(
            verify_signature("other", &payload),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn tampered_amount_is_forbidden() {
        let mut payload = payload_with_signature("topsecret");
        payload.amount_minor += 1;
        assert!(matches!(
            verify_signature("topsecret", &payload),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn malformed_hex_is_forbidden() {
        let mut payload = payload_with_signature("topsecret");
        payload.signature = "zz".into();
        assert!(matches!(
            verify_signature("topsecret", &payload),
            Err(AppError::Forbidden)
        ));
    }
}
