use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub token_ttl: usize,
    pub cookie_secure: bool,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_signup_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    /// Offset from UTC that defines the attendance "today".
    pub utc_offset_minutes: i32,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub log_dir: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl: parse_or("TOKEN_TTL", 86_400)?, // 1 day
            cookie_secure: parse_or("COOKIE_SECURE", false)?,

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_signup_per_min: parse_or("RATE_SIGNUP_PER_MIN", 30)?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_default(),
            utc_offset_minutes: parse_or("UTC_OFFSET_MINUTES", 0)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or("RUN_MIGRATIONS", true)?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        };

        if config.jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }
        if config.utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("UTC_OFFSET_MINUTES must be within one day");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: u32 = parse_or("EMPOWERHR_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("EMPOWERHR_TEST_BAD_NUMBER", "twelve") };
        let result: Result<u32> = parse_or("EMPOWERHR_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
    }

    #[test]
    fn parse_or_reads_booleans() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("EMPOWERHR_TEST_FLAG", "true") };
        let flag: bool = parse_or("EMPOWERHR_TEST_FLAG", false).unwrap();
        assert!(flag);
    }
}
