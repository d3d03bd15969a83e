use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Check-ins farther than this from the client carry a warning
    pub distance_warning_km: f64,

    pub log_dir: String,
    pub log_level: tracing::Level,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn optional<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let distance_warning_km: f64 = optional("DISTANCE_WARNING_KM", 0.5)?;
        if !distance_warning_km.is_finite() || distance_warning_km < 0.0 {
            anyhow::bail!("DISTANCE_WARNING_KM must be a non-negative number");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: optional("ACCESS_TOKEN_TTL", 28_800)?, // 8 hours, one shift

            rate_login_per_min: optional("RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: optional("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            distance_warning_km,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: optional("LOG_LEVEL", tracing::Level::INFO)?,
        })
    }
}
