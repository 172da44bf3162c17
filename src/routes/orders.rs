use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CheckoutResponse, OrderWithItems},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Identity},
    response::ApiResponse,
    routes::params::Pagination,
    services::{admin_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Caller's orders; admins get all orders enriched with usernames"),
        (status = 401, description = "Unauthenticated"),
    ),
    security(("cookie_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    identity: Identity,
    Query(pagination): Query<Pagination>,
) -> AppResult<Response> {
    if identity.is_admin {
        let resp = admin_service::list_all_orders(&state, pagination).await?;
        return Ok(Json(resp).into_response());
    }
    let user_id = identity.user_id.ok_or(AppError::Unauthorized)?;
    let resp = order_service::list_orders(&state, user_id, pagination).await?;
    Ok(Json(resp).into_response())
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "One of the caller's orders with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found"),
    ),
    security(("cookie_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    responses(
        (status = 201, description = "Order created from the cart", body = ApiResponse<CheckoutResponse>),
        (status = 400, description = "Cart is empty"),
    ),
    security(("cookie_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<(StatusCode, Json<ApiResponse<CheckoutResponse>>)> {
    let resp = order_service::checkout(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
