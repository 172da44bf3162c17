use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const IDENTITY_KEY: &str = "identity";

/// What the session cookie resolves to. `user_id` is `None` for the
/// environment-configured admin, which has no row in the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
}

pub async fn set_identity(session: &Session, identity: &SessionIdentity) -> AppResult<()> {
    session.insert(IDENTITY_KEY, identity).await?;
    Ok(())
}

/// Resolve the caller's identity, re-checking that a user-backed session
/// still points at an existing user. A deleted user's live session resolves
/// to `None` here, so it is rejected on its next gated request.
pub async fn current_identity(
    state: &AppState,
    session: &Session,
) -> AppResult<Option<SessionIdentity>> {
    let identity: Option<SessionIdentity> = session.get(IDENTITY_KEY).await?;
    let Some(identity) = identity else {
        return Ok(None);
    };
    if let Some(user_id) = identity.user_id {
        if !crate::services::user_service::user_exists(&state.pool, user_id).await? {
            return Ok(None);
        }
    }
    Ok(Some(identity))
}

fn session_from_parts(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AppError::Unauthorized)
}

/// Any authenticated caller: a still-existing user or the environment admin.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
}

impl Identity {
    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id)
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts)?;
        let identity = current_identity(state, &session)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(Identity {
            user_id: identity.user_id,
            is_admin: identity.is_admin,
        })
    }
}

/// A caller backed by a row in the users table. Required by the user-scoped
/// endpoints (cart, checkout); the environment admin does not qualify.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        let user_id = identity.user_id.ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            user_id,
            is_admin: identity.is_admin,
        })
    }
}

/// An admin caller: either an admin-role user or the environment admin.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Option<Uuid>,
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser {
            user_id: identity.user_id,
        })
    }
}
