use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::{config::AppConfig, db::DbPool};

pub const SESSION_COOKIE_NAME: &str = "shop_session";

/// Sessions expire after 4 hours of inactivity.
const SESSION_EXPIRY_SECONDS: i64 = 4 * 60 * 60;

/// Build the Postgres-backed session layer. Runs the store's own migration
/// so the session table exists before the first request.
pub async fn create_session_layer(
    pool: &DbPool,
    config: &AppConfig,
) -> anyhow::Result<SessionManagerLayer<PostgresStore>> {
    let store = PostgresStore::new(pool.clone());
    store.migrate().await?;

    let layer = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.cookie_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/");

    Ok(layer)
}
