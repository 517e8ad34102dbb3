use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub allowed_origin: String,
    pub session_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8787".into())
                .parse()
                .context("PORT must be a number")?,
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/humanizer.db".into()),
            allowed_origin: std::env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            session_ttl_days: std::env::var("SESSION_TTL_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .context("SESSION_TTL_DAYS must be a number")?,
        })
    }
}
