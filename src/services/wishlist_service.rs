use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::wishlist::{AddWishlistRequest, WishlistProductList},
    error::{AppError, AppResult},
    models::{Owner, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
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

pub async fn list_wishlist(
    state: &AppState,
    owner: &Owner,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let (items, total) = match owner {
        Owner::User(user_id) => {
            let (total,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(&state.pool)
                    .await?;

            let items = sqlx::query_as::<_, Product>(
                r#"
                SELECT p.* FROM products p
                JOIN wishlist_items w ON w.product_id = p.id
                WHERE w.user_id = $1
                ORDER BY w.created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&state.pool)
            .await?;
            (items, total)
        }
        Owner::Session(session_id) => {
            let ids = state.sessions.wishlist_entries(session_id);
            let total = ids.len() as i64;
            let page_ids: Vec<Uuid> = ids
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            let items = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
                .bind(&page_ids)
                .fetch_all(&state.pool)
                .await?;
            (items, total)
        }
    };

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Wishlist",
        WishlistProductList { items },
        Some(meta),
    ))
}

pub async fn add_to_wishlist(
    state: &AppState,
    owner: &Owner,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_product_exists(state, payload.product_id).await?;

    match owner {
        Owner::User(user_id) => {
            let result = sqlx::query(
                r#"
                INSERT INTO wishlist_items (id, user_id, product_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, product_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(payload.product_id)
            .execute(&state.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::AlreadyExists);
            }

            if let Err(err) = log_audit(
                &state.pool,
                Some(*user_id),
                "wishlist_add",
                Some("wishlist_items"),
                Some(serde_json::json!({ "product_id": payload.product_id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
        }
        Owner::Session(session_id) => {
            if !state.sessions.wishlist_add(session_id, payload.product_id) {
                return Err(AppError::AlreadyExists);
            }
        }
    }

    Ok(ApiResponse::success(
        "Added to wishlist",
        serde_json::json!({ "product_id": payload.product_id }),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    owner: &Owner,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    match owner {
        Owner::User(user_id) => {
            let result =
                sqlx::query("DELETE FROM wishlist_items WHERE product_id = $1 AND user_id = $2")
                    .bind(product_id)
                    .bind(user_id)
                    .execute(&state.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound);
            }
        }
        Owner::Session(session_id) => {
            state.sessions.wishlist_remove(session_id, product_id)?;
        }
    }

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
