// src/config.rs
//! Runtime configuration read from the environment (a `.env` file is loaded first by `main`).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub storage_timeout: Duration,
    pub session_ttl: chrono::Duration,
    pub max_upload_bytes: usize,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./budget_planner.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            media_root: PathBuf::from("media"),
            db_max_connections: 5,
            db_acquire_timeout: Duration::from_secs(5),
            storage_timeout: Duration::from_secs(10),
            session_ttl: chrono::Duration::hours(12),
            max_upload_bytes: 20 * 1024 * 1024,
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: env_parse("BUDGET_BIND", defaults.bind_addr)?,
            media_root: env::var("BUDGET_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            db_max_connections: env_parse("BUDGET_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: Duration::from_millis(env_parse(
                "BUDGET_DB_ACQUIRE_TIMEOUT_MS",
                defaults.db_acquire_timeout.as_millis() as u64,
            )?),
            storage_timeout: Duration::from_millis(env_parse(
                "BUDGET_STORAGE_TIMEOUT_MS",
                defaults.storage_timeout.as_millis() as u64,
            )?),
            session_ttl: chrono::Duration::hours(env_parse(
                "BUDGET_SESSION_TTL_HOURS",
                defaults.session_ttl.num_hours(),
            )?),
            max_upload_bytes: env_parse("BUDGET_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            log_json: env_bool("BUDGET_LOG_JSON", defaults.log_json)?,
        })
    }
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).ok_or_else(|| anyhow!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
