use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartList},
    entity::cart_items::{Column as CartCol, Entity as CartItems},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartLine,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let items = sqlx::query_as::<_, CartLine>(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY added_at ASC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Reserve `quantity` units of a product into the caller's cart.
///
/// The stock decrement is a conditional write: the guard `stock >= quantity`
/// is re-evaluated by the store at write time, so a concurrent consumer that
/// drains the stock between our read and our write turns the decrement into
/// a no-op and the whole call fails with `InsufficientStock`. Decrement and
/// line upsert commit together.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartLine>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let mut txn = state.pool.begin().await?;

    let product: Option<(String, i64, i32)> =
        sqlx::query_as("SELECT title, price, stock FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(&mut *txn)
            .await?;
    let Some((title, price, stock)) = product else {
        return Err(AppError::NotFound);
    };
    if payload.quantity > stock {
        return Err(AppError::InsufficientStock);
    }

    let decremented =
        sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(payload.product_id)
            .bind(payload.quantity)
            .execute(&mut *txn)
            .await?;
    if decremented.rows_affected() == 0 {
        // Guard failed at write time: somebody else took the stock after our
        // read passed.
        return Err(AppError::InsufficientStock);
    }

    // Existing lines keep the title/price captured on first add.
    let line: CartLine = sqlx::query_as(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity, title, price)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .bind(&title)
    .bind(price)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", line, None))
}

/// Release a reservation. Removing a line that does not exist is a no-op
/// success. The stock restore and the line delete are two sequenced writes
/// on purpose: the restore must be attempted even when the delete then
/// fails, and that partial failure (stock inflated, line orphaned) is a
/// logged degraded state rather than an error to the caller.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let line: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;

    let Some((quantity,)) = line else {
        return Ok(ApiResponse::success(
            "Removed from cart",
            serde_json::json!({}),
            Some(Meta::empty()),
        ));
    };

    let restored = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(&state.pool)
        .await?;
    if restored.rows_affected() == 0 {
        tracing::warn!(%product_id, quantity, "stock restore skipped: product no longer exists");
    }

    let deleted = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(&state.pool)
        .await;
    if let Err(err) = deleted {
        tracing::warn!(%product_id, error = %err, "cart line delete failed after stock restore");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Bulk-delete every line for a user. Checkout runs this on its own
/// transaction so the clear commits together with the order write.
pub async fn clear_cart<C>(conn: &C, user_id: Uuid) -> Result<u64, sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
