use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub max_connections: u32,
    /// Offset of the business calendar from UTC; "today" and order-code dates use it.
    pub business_utc_offset_hours: i32,
    pub import_max_bytes: usize,
    pub notification_buffer: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            business_utc_offset_hours: parse_or("BUSINESS_UTC_OFFSET_HOURS", 4),
            import_max_bytes: parse_or("IMPORT_MAX_BYTES", 5 * 1024 * 1024),
            notification_buffer: parse_or("NOTIFICATION_BUFFER", 1024),
        })
    }

    /// Config for tests and tools that only need a database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            max_connections: 5,
            business_utc_offset_hours: 4,
            import_max_bytes: 5 * 1024 * 1024,
            notification_buffer: 64,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
