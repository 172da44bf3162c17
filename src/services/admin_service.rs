use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::{
    dto::orders::{AdminOrder, AdminOrderList},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        users::{Column as UserCol, Entity as Users},
    },
    error::AppResult,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// System-wide order listing. Each order carries a display username resolved
/// by a secondary lookup; orders whose owner has been deleted fall back to
/// showing the raw user id.
pub async fn list_all_orders(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<AdminOrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find().order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let user_ids: Vec<Uuid> = orders.iter().map(|o| o.user_id).collect();
    let usernames: HashMap<Uuid, String> = Users::find()
        .filter(UserCol::Id.is_in(user_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let items = orders
        .into_iter()
        .map(|o| AdminOrder {
            id: o.id,
            user_id: o.user_id,
            username: usernames
                .get(&o.user_id)
                .cloned()
                .unwrap_or_else(|| o.user_id.to_string()),
            total: o.total,
            created_at: o.created_at.with_timezone(&chrono::Utc),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { items },
        Some(meta),
    ))
}
