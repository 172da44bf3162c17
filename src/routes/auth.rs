use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::{
    dto::auth::{LoginRequest, LoginResponse, MeResponse},
    error::AppResult,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login(&state, &session, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Logout", body = ApiResponse<serde_json::Value>)
    ),
    security(("cookie_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(session: Session) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::logout(&session).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current session identity", body = ApiResponse<MeResponse>)
    ),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let resp = auth_service::me(&state, &session).await?;
    Ok(Json(resp))
}
