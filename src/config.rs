use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub report_timeout: Duration,
    /// Zero disables the daily lookup cache.
    pub cache_ttl: Duration,
    pub log_file_path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fetch_concurrency: usize = parse_or(&lookup, "FETCH_CONCURRENCY", 8)?;
        if fetch_concurrency == 0 {
            bail!("FETCH_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            api_base: lookup("ATTENDANCE_API_BASE")
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            fetch_concurrency,
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 30)?),
            report_timeout: Duration::from_secs(parse_or(&lookup, "REPORT_TIMEOUT_SECS", 120)?),
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 0)?),
            log_file_path: lookup("LOG_FILE_PATH")
                .unwrap_or_else(|| "logs/attendance_rater.log".to_string()),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}
