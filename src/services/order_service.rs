use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutResponse, OrderList, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::cart_service,
    state::AppState,
};

/// Order total from the cart snapshot: the price honored at checkout is the
/// one captured when each line was added, not the current catalog price.
pub fn compute_total(lines: &[cart_items::Model]) -> i64 {
    lines
        .iter()
        .map(|line| line.price * i64::from(line.quantity))
        .sum()
}

/// Convert the caller's cart into an immutable order.
///
/// The whole transition runs in one store transaction: snapshot-read the
/// lines, write the order and its items, clear the cart, commit. The order
/// is the durable source of truth once the commit lands; nothing here
/// touches product stock, which was already reserved line by line at
/// add-to-cart time.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let txn = state.orm.begin().await?;

    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::AddedAt)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let total = compute_total(&lines);
    let order_id = Uuid::new_v4();

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        total: Set(total),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (idx, line) in lines.iter().enumerate() {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            line_no: Set(idx as i32),
        }
        .insert(&txn)
        .await?;
    }

    cart_service::clear_cart(&txn, user.user_id).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        CheckoutResponse {
            order_id: order.id,
            total,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::LineNo)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total: model.total,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        line_no: model.line_no,
    }
}
