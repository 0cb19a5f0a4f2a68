mod common;

use gamekeys_api::{
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{Owner, OrderKind},
    services::{cart_service, order_service, payment_service},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

fn sign(secret: &str, payload: &payment_service::WebhookPayload) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(
        format!(
            "{}:{}:{}",
            payload.order_id, payload.status, payload.amount_minor
        )
        .as_bytes(),
    );
    mac.finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// Full flow: add to cart -> checkout -> gateway webhook settles -> admin ships.
#[tokio::test]
async fn checkout_webhook_and_admin_status_flow() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let admin_id = common::create_user(&state, "admin").await?;
    let product_id = common::create_product(&state, 1000, 10).await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let auth_admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    cart_service::add_to_cart(
        &state,
        &Owner::User(user_id),
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let checkout_resp = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            address: "Somewhere 1".into(),
            kind: OrderKind::GameKey {
                platform: "steam".into(),
            },
        },
    )
    .await?;
    let order = checkout_resp.data.unwrap().order;
    assert_eq!(order.total_amount, 2000);
    assert_eq!(order.status, "pending");
    assert_eq!(order.address, "Somewhere 1");

    // Stock was decremented at checkout.
    let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(stock, 8);

    // A tampered signature never settles anything.
    let mut forged = payment_service::WebhookPayload {
        order_id: order.id,
        status: "paid".into(),
        amount_minor: order.total_amount,
        signature: "deadbeef".into(),
    };
    let err = payment_service::handle_webhook(&state, forged)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // The real gateway notification settles the order.
    forged = payment_service::WebhookPayload {
        order_id: order.id,
        status: "paid".into(),
        amount_minor: order.total_amount,
        signature: String::new(),
    };
    forged.signature = sign(&state.webhook_secret, &forged);
    payment_service::handle_webhook(&state, forged).await?;

    let paid = order_service::get_order(&state, &auth_user, order.id).await?;
    let paid_order = paid.data.unwrap().order;
    assert_eq!(paid_order.payment_status, "paid");
    assert!(paid_order.paid_at.is_some());

    // Settling twice is rejected.
    let mut replay = payment_service::WebhookPayload {
        order_id: order.id,
        status: "paid".into(),
        amount_minor: order.total_amount,
        signature: String::new(),
    };
    replay.signature = sign(&state.webhook_secret, &replay);
    let err = payment_service::handle_webhook(&state, replay)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists));

    // Admin moves it along.
    let updated =
        order_service::update_order_status(&state, &auth_admin, order.id, "shipped".into())
            .await?;
    assert_eq!(updated.data.unwrap().status, "shipped");

    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };

    let err = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            address: "Somewhere 2".into(),
            kind: OrderKind::GiftCard { value_minor: 2500 },
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn pending_order_can_be_deleted_by_owner_only() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let stranger_id = common::create_user(&state, "user").await?;
    let product_id = common::create_product(&state, 500, 5).await?;

    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    let stranger = AuthUser {
        user_id: stranger_id,
        role: "user".into(),
    };

    cart_service::add_to_cart(
        &state,
        &Owner::User(user_id),
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::checkout(
        &state,
        &auth_user,
        CheckoutRequest {
            address: "Somewhere 3".into(),
            kind: OrderKind::GameKey {
                platform: "psn".into(),
            },
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = order_service::delete_order(&state, &stranger, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    order_service::delete_order(&state, &auth_user, order.id).await?;
    let err = order_service::get_order(&state, &auth_user, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}
