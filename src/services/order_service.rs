use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        CartItems, OrderItems, Orders, Products,
        cart_items::Column as CartCol,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        products::ActiveModel as ProductActive,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    uow::{UnitOfWork, map_db_err, map_delete_err},
};

/// Turn the authenticated user's cart into an order. Runs inside one
/// transaction: products are locked for update, stock is validated and
/// decremented, the unit price at checkout time is captured on each order
/// item, and the cart is emptied.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.address.trim().is_empty() {
        return Err(AppError::BadRequest("address must not be empty".into()));
    }

    let uow = UnitOfWork::begin(&state.orm).await?;

    let cart_items = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .all(uow.conn())
        .await
        .map_err(map_db_err)?;

    if cart_items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let order_id = Uuid::new_v4();
    let mut total_amount: i64 = 0;
    let mut item_actives = Vec::with_capacity(cart_items.len());

    for cart_item in &cart_items {
        let product = Products::find_by_id(cart_item.product_id)
            .lock(LockType::Update)
            .one(uow.conn())
            .await
            .map_err(map_db_err)?
            .ok_or(AppError::RelatedResourceNotFound)?;

        if product.stock < cart_item.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }

        total_amount += product.price * i64::from(cart_item.quantity);

        item_actives.push(OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(product.id),
            quantity: Set(cart_item.quantity),
            price: Set(product.price),
            created_at: Set(Utc::now().into()),
        });

        let new_stock = product.stock - cart_item.quantity;
        let mut active: ProductActive = product.into();
        active.stock = Set(new_stock);
        sea_orm::ActiveModelTrait::update(active, uow.conn())
            .await
            .map_err(map_db_err)?;
    }

    let now = Utc::now();
    let kind_json = serde_json::to_value(&payload.kind)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    let order_active = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set("pending".to_string()),
        payment_status: Set("unpaid".to_string()),
        invoice_number: Set(invoice_number(order_id)),
        address: Set(payload.address.trim().to_string()),
        kind: Set(kind_json),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let order = sea_orm::ActiveModelTrait::insert(order_active, uow.conn())
        .await
        .map_err(map_db_err)?;

    OrderItems::insert_many(item_actives)
        .exec(uow.conn())
        .await
        .map_err(map_db_err)?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(uow.conn())
        .await
        .map_err(map_db_err)?;

    uow.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let data = OrderWithItems {
        order: order_from_entity(order)?,
        items,
    };
    Ok(ApiResponse::success("Order created", data, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<Order>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id && user.role != "admin" {
        return Err(AppError::Forbidden);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let data = OrderWithItems {
        order: order_from_entity(order)?,
        items,
    };
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

/// A pending, unpaid order can be withdrawn by its owner. The order items go
/// first so the order row itself is no longer referenced.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let uow = UnitOfWork::begin(&state.orm).await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(uow.conn())
        .await
        .map_err(map_db_err)?
        .ok_or(AppError::NotFound)?;

    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if order.status != "pending" || order.payment_status == "paid" {
        return Err(AppError::BadRequest("Only pending orders can be deleted".into()));
    }

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .exec(uow.conn())
        .await
        .map_err(map_db_err)?;

    Orders::delete_by_id(order.id)
        .exec(uow.conn())
        .await
        .map_err(map_delete_err)?;

    uow.commit().await?;

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({ "order_id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<Order>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    status: String,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    validate_order_status(&status)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = sea_orm::ActiveModelTrait::update(active, &state.orm)
        .await
        .map_err(map_db_err)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

/// Settle an order after a verified payment notification. Rejects amount
/// mismatches and double settlement.
pub async fn mark_paid(state: &AppState, order_id: Uuid, amount_minor: i64) -> AppResult<Order> {
    let uow = UnitOfWork::begin(&state.orm).await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(uow.conn())
        .await
        .map_err(map_db_err)?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == "paid" {
        return Err(AppError::AlreadyExists);
    }
    if order.total_amount != amount_minor {
        return Err(AppError::BadRequest(format!(
            "Amount mismatch: expected {}, got {}",
            order.total_amount, amount_minor
        )));
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set("paid".to_string());
    active.payment_status = Set("paid".to_string());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let updated = sea_orm::ActiveModelTrait::update(active, uow.conn())
        .await
        .map_err(map_db_err)?;

    uow.commit().await?;
    order_from_entity(updated)
}

fn validate_order_status(status: &str) -> Result<(), AppError> {
    const VALID: [&str; 5] = ["pending", "paid", "shipped", "completed", "cancelled"];
    if VALID.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid order status".into()))
    }
}

fn invoice_number(order_id: Uuid) -> String {
    let short = order_id.simple().to_string();
    format!("INV-{}-{}", Utc::now().format("%Y%m%d"), &short[..8])
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let kind = serde_json::from_value(model.kind)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt order kind: {e}")))?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        payment_status: model.payment_status,
        invoice_number: model.invoice_number,
        address: model.address,
        kind,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_shape() {
        let inv = invoice_number(Uuid::new_v4());
        let parts: Vec<&str> = inv.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn order_status_validation() {
        assert!(validate_order_status("shipped").is_ok());
        assert!(validate_order_status("refunded").is_err());
    }
}
