use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::users::{RegisterRequest, UpdateUserRequest, UserList, UserPublic},
    error::{AppError, AppResult},
    middleware::auth::Identity,
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::auth_service::hash_password,
    state::AppState,
};

pub async fn user_exists(pool: &DbPool, user_id: Uuid) -> AppResult<bool> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Registration. Username and email uniqueness is checked before the insert
/// for the friendly 409; the unique indexes close the check-then-insert race
/// and surface as the same conflict.
pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserPublic>> {
    let RegisterRequest {
        username,
        email,
        password,
    } = payload;

    if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "username, email and password are required".to_string(),
        ));
    }

    ensure_username_free(&state.pool, &username, None).await?;
    ensure_email_free(&state.pool, &email, None).await?;

    let password_hash = hash_password(&password)?;
    let id = Uuid::new_v4();

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(id)
    .bind(username.as_str())
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await
    .map_err(conflict_on_unique_violation)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("User created", user.into(), None))
}

pub async fn list_users(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;

    let items = users.into_iter().map(UserPublic::from).collect();
    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

/// Partial update; only the provided fields are written. Self-service for
/// everything except `role`, which stays admin-only.
pub async fn update_user(
    state: &AppState,
    actor: &Identity,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<UserPublic>> {
    if !actor.is_admin && !actor.is_self(id) {
        return Err(AppError::Forbidden);
    }
    if payload.role.is_some() && !actor.is_admin {
        return Err(AppError::Forbidden);
    }
    if let Some(role) = payload.role.as_deref() {
        if role != "user" && role != "admin" {
            return Err(AppError::BadRequest("role must be user or admin".into()));
        }
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    if let Some(username) = payload.username.as_deref() {
        if username.trim().is_empty() {
            return Err(AppError::BadRequest("username must not be empty".into()));
        }
        if username != user.username {
            ensure_username_free(&state.pool, username, Some(id)).await?;
        }
    }
    if let Some(email) = payload.email.as_deref() {
        if email.trim().is_empty() {
            return Err(AppError::BadRequest("email must not be empty".into()));
        }
        if email != user.email {
            ensure_email_free(&state.pool, email, Some(id)).await?;
        }
    }

    let username = payload.username.unwrap_or(user.username);
    let email = payload.email.unwrap_or(user.email);
    let role = payload.role.unwrap_or(user.role);
    let password_hash = match payload.password {
        Some(password) if !password.is_empty() => hash_password(&password)?,
        Some(_) => return Err(AppError::BadRequest("password must not be empty".into())),
        None => user.password_hash,
    };

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET username = $2, email = $3, password_hash = $4, role = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(&state.pool)
    .await
    .map_err(conflict_on_unique_violation)?;

    if let Err(err) = log_audit(
        &state.pool,
        actor.user_id,
        "user_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", updated.into(), None))
}

/// Deletion does not cascade: the user's cart lines and orders stay behind.
/// Deleting the session's own user also ends the session.
pub async fn delete_user(
    state: &AppState,
    actor: &Identity,
    session: &Session,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !actor.is_admin && !actor.is_self(id) {
        return Err(AppError::Forbidden);
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if actor.is_self(id) {
        session.flush().await?;
    }

    if let Err(err) = log_audit(
        &state.pool,
        actor.user_id,
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn ensure_username_free(
    pool: &DbPool,
    username: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2)")
            .bind(username)
            .bind(exclude)
            .fetch_optional(pool)
            .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Username is already taken".to_string()));
    }
    Ok(())
}

async fn ensure_email_free(pool: &DbPool, email: &str, exclude: Option<Uuid>) -> AppResult<()> {
    let taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)")
            .bind(email)
            .bind(exclude)
            .fetch_optional(pool)
            .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Email is already taken".to_string()));
    }
    Ok(())
}

fn conflict_on_unique_violation(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Username or email is already taken".to_string())
        }
        _ => AppError::from(err),
    }
}
