use anyhow::Result;
use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub type OrmConn = sea_orm::DatabaseConnection;

/// Create a SeaORM connection for the entity-based services.
pub async fn create_orm_conn(database_url: &str) -> Result<OrmConn> {
    let conn = sea_orm::Database::connect(database_url).await?;
    Ok(conn)
}
