use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use tower_sessions::Session;

use crate::{
    audit::log_audit,
    dto::auth::{LoginRequest, LoginResponse, MeResponse},
    error::{AppError, AppResult},
    middleware::auth::{SessionIdentity, current_identity, set_identity},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Resolve credentials into a session identity. The environment-configured
/// admin credential is checked first and never touches the users table.
pub async fn login(
    state: &AppState,
    session: &Session,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;

    if let (Some(admin_email), Some(admin_password)) =
        (&state.config.admin_email, &state.config.admin_password)
    {
        if email == *admin_email && password == *admin_password {
            set_identity(
                session,
                &SessionIdentity {
                    user_id: None,
                    is_admin: true,
                },
            )
            .await?;

            if let Err(err) =
                log_audit(&state.pool, None, "admin_login", Some("users"), None).await
            {
                tracing::warn!(error = %err, "audit log failed");
            }

            return Ok(ApiResponse::success(
                "Logged in",
                LoginResponse { is_admin: true },
                Some(Meta::empty()),
            ));
        }
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let is_admin = user.is_admin();
    set_identity(
        session,
        &SessionIdentity {
            user_id: Some(user.id),
            is_admin,
        },
    )
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { is_admin },
        Some(Meta::empty()),
    ))
}

pub async fn logout(session: &Session) -> AppResult<ApiResponse<serde_json::Value>> {
    session.flush().await?;
    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Identity of the current session, or the anonymous identity when there is
/// no session or its user has been deleted. Never an error.
pub async fn me(state: &AppState, session: &Session) -> AppResult<ApiResponse<MeResponse>> {
    let me = match current_identity(state, session).await? {
        Some(identity) => MeResponse {
            user_id: identity.user_id,
            is_admin: identity.is_admin,
        },
        None => MeResponse::anonymous(),
    };
    Ok(ApiResponse::success("OK", me, None))
}
