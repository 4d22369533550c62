use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use crate::embedding::openai::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::embedding::DEFAULT_MAX_CHARS;

/// Where documents are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    /// Process-local storage; contents are lost on restart.
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub openai_api_key: String,
    pub embedding_api_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_max_chars: usize,
    /// Applied by callers around each provider round trip.
    pub embedding_timeout_secs: u64,
    pub backfill_batch_size: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("Required environment variable '{key}' is not set"))
        };

        let store = match lookup("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => StoreBackend::Postgres {
                database_url: require("DATABASE_URL")?,
            },
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        Ok(Config {
            store,
            openai_api_key: require("OPENAI_API_KEY")?,
            embedding_api_url: lookup("EMBEDDING_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_dimensions: parse_positive(&lookup, "EMBEDDING_DIMENSIONS", 1536)?,
            embedding_max_chars: parse_positive(&lookup, "EMBEDDING_MAX_CHARS", DEFAULT_MAX_CHARS)?,
            embedding_timeout_secs: parse_positive(&lookup, "EMBEDDING_TIMEOUT_SECS", 60)?,
            backfill_batch_size: parse_positive(&lookup, "BACKFILL_BATCH_SIZE", 64)?,
            port: parse_or(&lookup, "PORT", 8000)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
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
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() {
        bail!("{key} must be greater than zero");
    }
    Ok(value)
}
