use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Credential pair for the out-of-band admin login. When both are set,
    /// a login matching them yields an admin session that is not backed by
    /// any row in the users table.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let admin_email = env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());
        let cookie_secure = env::var("COOKIE_SECURE")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);
        Ok(Self {
            database_url,
            host,
            port,
            admin_email,
            admin_password,
            cookie_secure,
        })
    }
}
