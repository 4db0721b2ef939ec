//! Service configuration, read from the environment (after `.env` is loaded).

use thiserror::Error;

use crate::domain::services::currency_converter::{normalize_code, RateTable};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub nats_url: Option<String>,
    pub port: u16,
    /// Currency product prices are stored in; rate 1 in every rate table.
    pub base_currency: String,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let nats_url = lookup("NATS_URL").filter(|url| !url.is_empty());
        let port = parse_or(&lookup, "PORT", 8083)?;
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;

        let raw = lookup("BASE_CURRENCY").unwrap_or_else(|| "USD".to_string());
        let base_currency = normalize_code(&raw).map_err(|_| ConfigError::Invalid { key: "BASE_CURRENCY", value: raw.clone() })?;
        if !RateTable::fallback().contains(&base_currency) {
            return Err(ConfigError::Invalid { key: "BASE_CURRENCY", value: raw });
        }

        Ok(Self { database_url, nats_url, port, base_currency, max_connections })
    }

    /// Settings for tests and local tooling that never touch a database.
    pub fn for_tests() -> Self {
        Self { database_url: String::new(), nats_url: None, port: 0, base_currency: "USD".into(), max_connections: 1 }
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
