use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartEntry, CartItemDto, CartList, UpdateQuantityRequest},
    entity::{
        CartItems, WishlistItems,
        cart_items::{ActiveModel as CartActive, Column as CartCol},
        wishlist_items::{ActiveModel as WishlistActive, Column as WishCol},
    },
    error::{AppError, AppResult},
    models::{Owner, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
    uow::{UnitOfWork, map_db_err},
};

async fn ensure_product_exists(state: &AppState, product_id: Uuid) -> AppResult<()> {
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::RelatedResourceNotFound);
    }
    Ok(())
}

async fn products_by_ids(state: &AppState, ids: &[Uuid]) -> AppResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&state.pool)
        .await?;
    Ok(products)
}

pub async fn list_cart(
    state: &AppState,
    owner: &Owner,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();

    let entries: Vec<(Uuid, i32)> = match owner {
        Owner::User(user_id) => {
            sqlx::query_as::<_, (Uuid, i32)>(
                "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&state.pool)
            .await?
        }
        Owner::Session(session_id) => state.sessions.cart_entries(session_id),
    };

    let total = entries.len() as i64;
    let page_entries: Vec<(Uuid, i32)> = entries
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    let ids: Vec<Uuid> = page_entries.iter().map(|(id, _)| *id).collect();
    let products = products_by_ids(state, &ids).await?;

    let items = page_entries
        .into_iter()
        .filter_map(|(product_id, quantity)| {
            products
                .iter()
                .find(|p| p.id == product_id)
                .map(|product| CartItemDto {
                    product: product.clone(),
                    quantity,
                })
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Create-if-absent, otherwise increment. The user path leans on the
/// database's atomic upsert so concurrent adds cannot lose increments; the
/// session path increments under the store's lock.
pub async fn add_to_cart(
    state: &AppState,
    owner: &Owner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartEntry>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    ensure_product_exists(state, payload.product_id).await?;

    let quantity = match owner {
        Owner::User(user_id) => {
            let (quantity,): (i32,) = sqlx::query_as(
                r#"
                INSERT INTO cart_items (id, user_id, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, product_id)
                DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
                RETURNING quantity
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(payload.product_id)
            .bind(payload.quantity)
            .fetch_one(&state.pool)
            .await?;
            quantity
        }
        Owner::Session(session_id) => {
            state
                .sessions
                .cart_add(session_id, payload.product_id, payload.quantity)
        }
    };

    if let Owner::User(user_id) = owner {
        if let Err(err) = log_audit(
            &state.pool,
            Some(*user_id),
            "cart_add",
            Some("cart_items"),
            Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
    }

    let entry = CartEntry {
        product_id: payload.product_id,
        quantity,
    };
    Ok(ApiResponse::success("OK", entry, None))
}

/// Setting the quantity to 0 is equivalent to removing the entry.
pub async fn update_quantity(
    state: &AppState,
    owner: &Owner,
    product_id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }
    if payload.quantity == 0 {
        return remove_from_cart(state, owner, product_id).await;
    }

    match owner {
        Owner::User(user_id) => {
            let result = sqlx::query(
                "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
            )
            .bind(user_id)
            .bind(product_id)
            .bind(payload.quantity)
            .execute(&state.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }
        }
        Owner::Session(session_id) => {
            state
                .sessions
                .cart_set_quantity(session_id, product_id, payload.quantity)?;
        }
    }

    Ok(ApiResponse::success(
        "Quantity updated",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    owner: &Owner,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    match owner {
        Owner::User(user_id) => {
            let result =
                sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
                    .bind(product_id)
                    .bind(user_id)
                    .execute(&state.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }

            if let Err(err) = log_audit(
                &state.pool,
                Some(*user_id),
                "cart_remove",
                Some("cart_items"),
                Some(serde_json::json!({ "product_id": product_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
        }
        Owner::Session(session_id) => {
            state.sessions.cart_remove(session_id, product_id)?;
        }
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Copy an anonymous session's cart and wishlist into the user's durable
/// storage on login/signup. Entries are MERGED: quantities for products in
/// both carts are summed and the wishlist is a set union. The session is
/// cleared only after the user-side writes commit.
pub async fn migrate_session_to_user(
    state: &AppState,
    session_id: &str,
    user_id: Uuid,
) -> AppResult<()> {
    let snapshot = state.sessions.snapshot(session_id);
    if snapshot.is_empty() {
        state.sessions.clear(session_id);
        return Ok(());
    }

    let uow = UnitOfWork::begin(&state.orm).await?;

    for (product_id, quantity) in &snapshot.cart {
        let existing = CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .filter(CartCol::ProductId.eq(*product_id))
            .one(uow.conn())
            .await
            .map_err(map_db_err)?;

        match existing {
            Some(item) => {
                let merged = item.quantity + quantity;
                let mut active: CartActive = item.into();
                active.quantity = Set(merged);
                sea_orm::ActiveModelTrait::update(active, uow.conn())
                    .await
                    .map_err(map_db_err)?;
            }
            None => {
                let active = CartActive {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(*product_id),
                    quantity: Set(*quantity),
                    created_at: Set(chrono::Utc::now().into()),
                };
                CartItems::insert(active)
                    .exec(uow.conn())
                    .await
                    .map_err(map_db_err)?;
            }
        }
    }

    for product_id in &snapshot.wishlist {
        let already = WishlistItems::find()
            .filter(WishCol::UserId.eq(user_id))
            .filter(WishCol::ProductId.eq(*product_id))
            .one(uow.conn())
            .await
            .map_err(map_db_err)?;
        if already.is_none() {
            let active = WishlistActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(*product_id),
                created_at: Set(chrono::Utc::now().into()),
            };
            WishlistItems::insert(active)
                .exec(uow.conn())
                .await
                .map_err(map_db_err)?;
        }
    }

    uow.commit().await?;
    state.sessions.clear(session_id);

    tracing::info!(
        %user_id,
        cart_entries = snapshot.cart.len(),
        wishlist_entries = snapshot.wishlist.len(),
        "migrated anonymous session into user storage"
    );
    Ok(())
}
