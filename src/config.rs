use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub upload_dir: String,
    pub allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./images".into());
        let allowed_origin = std::env::var("ALLOWED_ORIGIN").ok();
        Ok(Self {
            database_url,
            jwt,
            upload_dir,
            allowed_origin,
        })
    }
}
