mod common;

use gamekeys_api::{
    dto::cart::{AddToCartRequest, UpdateQuantityRequest},
    dto::wishlist::AddWishlistRequest,
    error::AppError,
    models::Owner,
    routes::params::Pagination,
    services::{cart_service, wishlist_service},
};
use uuid::Uuid;

#[tokio::test]
async fn cart_add_increments_and_zero_quantity_removes() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let product_id = common::create_product(&state, 1999, 10).await?;
    let owner = Owner::User(user_id);

    // Two adds for the same product sum their quantities.
    cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;
    let resp = cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;
    assert_eq!(resp.data.unwrap().quantity, 5);

    // Setting quantity to zero behaves exactly like removal.
    cart_service::update_quantity(
        &state,
        &owner,
        product_id,
        UpdateQuantityRequest { quantity: 0 },
    )
    .await?;
    let err = cart_service::remove_from_cart(&state, &owner, product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn cart_add_rejects_unknown_product() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let owner = Owner::User(user_id);

    let err = cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::RelatedResourceNotFound));

    Ok(())
}

#[tokio::test]
async fn wishlist_add_is_idempotent_membership() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let product_id = common::create_product(&state, 999, 5).await?;
    let owner = Owner::User(user_id);

    wishlist_service::add_to_wishlist(&state, &owner, AddWishlistRequest { product_id }).await?;
    let err = wishlist_service::add_to_wishlist(&state, &owner, AddWishlistRequest { product_id })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists));

    wishlist_service::remove_from_wishlist(&state, &owner, product_id).await?;
    let err = wishlist_service::remove_from_wishlist(&state, &owner, product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn session_migration_merges_into_user_and_clears_session() -> anyhow::Result<()> {
    let Some(state) = common::try_setup_state().await? else {
        return Ok(());
    };

    let user_id = common::create_user(&state, "user").await?;
    let shared = common::create_product(&state, 1500, 10).await?;
    let session_only = common::create_product(&state, 2500, 10).await?;
    let wished = common::create_product(&state, 3500, 10).await?;
    let owner = Owner::User(user_id);

    // The user already has one unit of the shared product.
    cart_service::add_to_cart(
        &state,
        &owner,
        AddToCartRequest {
            product_id: shared,
            quantity: 1,
        },
    )
    .await?;

    // The anonymous session gathered more of it, plus extras.
    let session_id = "migrating-session";
    state.sessions.cart_add(session_id, shared, 2);
    state.sessions.cart_add(session_id, session_only, 4);
    state.sessions.wishlist_add(session_id, wished);

    cart_service::migrate_session_to_user(&state, session_id, user_id).await?;

    // Quantities merged, not overwritten.
    let cart = cart_service::list_cart(
        &state,
        &owner,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await?;
    let items = cart.data.unwrap().items;
    let shared_qty = items
        .iter()
        .find(|i| i.product.id == shared)
        .map(|i| i.quantity);
    let extra_qty = items
        .iter()
        .find(|i| i.product.id == session_only)
        .map(|i| i.quantity);
    assert_eq!(shared_qty, Some(3));
    assert_eq!(extra_qty, Some(4));

    let wishlist = wishlist_service::list_wishlist(
        &state,
        &owner,
        Pagination {
            page: None,
            per_page: None,
        },
    )
    .await?;
    assert!(
        wishlist
            .data
            .unwrap()
            .items
            .iter()
            .any(|p| p.id == wished)
    );

    // The session document is gone.
    assert!(state.sessions.snapshot(session_id).is_empty());

    Ok(())
}
