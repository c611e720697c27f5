use std::str::FromStr;

use anyhow::{Context, Result};

use crate::analysis::orchestrator::MAX_RETRIES;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or numbers do not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Persistence and history are disabled when unset.
    pub database_url: Option<String>,
    pub groq_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub analysis_max_retries: u32,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            groq_api_key: require_env("GROQ_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            analysis_max_retries: parse_env("ANALYSIS_MAX_RETRIES", MAX_RETRIES)?,
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 100)?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", 60)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 60)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number (got '{raw}')")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without touching the process environment.
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            groq_api_key: "test-key".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            analysis_max_retries: MAX_RETRIES,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            request_timeout_secs: 60,
        }
    }
}
