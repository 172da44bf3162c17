use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order row for the system-wide admin listing. `username` falls back to the
/// raw user id when the owner has been deleted.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderList {
    pub items: Vec<AdminOrder>,
}
