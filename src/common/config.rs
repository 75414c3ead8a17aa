//! Environment-based Configuration
//!
//! Loads the gateway endpoint, asset, identity hints and poll timings from
//! environment variables. A `.env` file is honoured when present.
//!
//! # Environment Variables
//!
//! ## Gateway
//! - `BICYCLE_API_URL` - Gateway base URL (default: `http://localhost:8081`)
//! - `BICYCLE_API_KEY` - Bearer token (optional)
//!
//! ## Asset
//! - `DEPOSIT_CURRENCY` - Asset symbol (default: `TON`)
//! - `DEPOSIT_DECIMALS` - Minor-unit precision (default: 9 for TON, required otherwise)
//!
//! ## Identity
//! - `TELEGRAM_USER_ID` - Identity supplied by the mini-app host
//! - `DEPOSIT_USER_ID` - Locally-known user id
//!
//! ## Polling
//! - `POLL_INITIAL_DELAY_SECS`, `POLL_INTERVAL_SECS`, `POLL_ERROR_INTERVAL_SECS`
//! - `POLL_MAX_ATTEMPTS`, `POLL_HISTORY_LIMIT`
//! - `CONFIRMED_DISPLAY_SECS`, `FAILED_DISPLAY_SECS`
//! - `TX_VALIDITY_SECS`
//!
//! ## Misc
//! - `ADDRESS_CACHE_PATH` - SQLite file for the address cache
//! - `LOG_LEVEL` - trace, debug, info, warn, error
//! - `LOG_JSON` - Set to "1" for JSON logs

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::deposit_tracker::types::{PollerConfig, SubmitterConfig};
use crate::gateway::{DEFAULT_CURRENCY, DEFAULT_URL};
use crate::units::{Asset, MAX_DECIMALS, TON_DECIMALS};

/// Default location of the address cache
pub const DEFAULT_CACHE_PATH: &str = "data/address_cache.db";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    pub asset: Asset,
    /// Identity supplied by the embedding host
    pub host_user_id: Option<String>,
    /// Locally-known user id
    pub user_id: Option<String>,
    pub cache_path: PathBuf,
    pub poller: PollerConfig,
    pub submitter: SubmitterConfig,
    pub log_level: String,
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gateway = GatewayConfig {
            base_url: get("BICYCLE_API_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            api_key: get("BICYCLE_API_KEY"),
        };

        let currency = get("DEPOSIT_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let decimals = match get("DEPOSIT_DECIMALS") {
            Some(raw) => parse_value::<u32>("DEPOSIT_DECIMALS", &raw)?,
            None if currency == DEFAULT_CURRENCY => TON_DECIMALS,
            None => return Err(ConfigError::MissingEnvVar("DEPOSIT_DECIMALS".to_string())),
        };
        if decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidValue(
                "DEPOSIT_DECIMALS".to_string(),
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }

        let defaults = PollerConfig::default();
        let poller = PollerConfig {
            initial_delay: secs_or(&get, "POLL_INITIAL_DELAY_SECS", defaults.initial_delay)?,
            interval: secs_or(&get, "POLL_INTERVAL_SECS", defaults.interval)?,
            error_interval: secs_or(&get, "POLL_ERROR_INTERVAL_SECS", defaults.error_interval)?,
            max_attempts: value_or(&get, "POLL_MAX_ATTEMPTS", defaults.max_attempts)?,
            history_limit: value_or(&get, "POLL_HISTORY_LIMIT", defaults.history_limit)?,
            confirmed_display: secs_or(&get, "CONFIRMED_DISPLAY_SECS", defaults.confirmed_display)?,
            failed_display: secs_or(&get, "FAILED_DISPLAY_SECS", defaults.failed_display)?,
        };
        if poller.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let submitter = SubmitterConfig {
            validity: secs_or(&get, "TX_VALIDITY_SECS", SubmitterConfig::default().validity)?,
        };

        let log_json = get("LOG_JSON").map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        Ok(Self {
            gateway,
            asset: Asset::new(currency, decimals),
            host_user_id: get("TELEGRAM_USER_ID"),
            user_id: get("DEPOSIT_USER_ID"),
            cache_path: get("ADDRESS_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            poller,
            submitter,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: log_json.unwrap_or(false),
        })
    }

    /// Print configuration summary (hiding the API key)
    pub fn print_summary(&self) {
        println!("=== Deposit Configuration ===");
        println!("Gateway: {}", self.gateway.base_url);
        println!(
            "API Key: {}",
            if self.gateway.api_key.is_some() { "set" } else { "none" }
        );
        println!("Asset: {} ({} decimals)", self.asset.symbol, self.asset.decimals);
        println!("Address Cache: {}", self.cache_path.display());
        println!(
            "Polling: first check after {:?}, every {:?} ({:?} after errors), {} attempts",
            self.poller.initial_delay,
            self.poller.interval,
            self.poller.error_interval,
            self.poller.max_attempts
        );
        println!("Log Level: {}", self.log_level);
        println!("=============================");
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn value_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    value_or(get, key, default.as_secs()).map(Duration::from_secs)
}
