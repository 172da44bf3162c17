use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Not serialized directly; responses go through dto::users::UserPublic so the
// password hash never leaves the service layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Minor units (cents).
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

/// One (user, product) reservation. Title and price are copies captured when
/// the line was first added, so they may diverge from the current catalog.
#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartLine {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub title: String,
    pub price: i64,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub line_no: i32,
}
