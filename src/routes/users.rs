use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    dto::users::{RegisterRequest, UpdateUserRequest, UserList, UserPublic},
    error::AppResult,
    middleware::auth::{AdminUser, Identity},
    response::ApiResponse,
    routes::params::Pagination,
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register))
        .route("/{id}", put(update_user).delete(delete_user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List users (admin only)", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("cookie_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_users(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<UserPublic>),
        (status = 409, description = "Duplicate username or email"),
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserPublic>>)> {
    let resp = user_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Update user (self or admin)", body = ApiResponse<UserPublic>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Duplicate username or email"),
    ),
    security(("cookie_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    actor: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserPublic>>> {
    let resp = user_service::update_user(&state, &actor, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Delete user (self or admin)", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("cookie_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    actor: Identity,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = user_service::delete_user(&state, &actor, &session, id).await?;
    Ok(Json(resp))
}
