//! Structured Logging
//!
//! Provides structured logging with:
//! - JSON output for log aggregation
//! - Correlation IDs tying gateway calls and poll attempts to one session
//! - Deposit lifecycle, wallet, address cache and startup events
//!
//! # Usage
//!
//! ```rust,no_run
//! use market_deposit::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, false).expect("logging");
//! tracing::info!(target: "market_deposit::deposit", memo = "DEP-1-abcdef", "watching");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Gateway request/response events
    Gateway,
    /// Deposit lifecycle events
    Deposit,
    /// Wallet interaction
    Wallet,
    /// Address cache reads/writes
    Cache,
    /// Startup, shutdown
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event helpers
// ============================================================================

/// Log an outgoing gateway request
pub fn log_gateway_request(method: &str, endpoint: &str, correlation_id: &str) {
    let event = LogEvent::new(
        LogLevel::Debug,
        EventCategory::Gateway,
        format!("{} {}", method, endpoint),
    )
    .with_correlation_id(correlation_id);

    tracing::debug!(target: "market_deposit::gateway", "{}", event.to_json());
}

/// Log a gateway response
pub fn log_gateway_response(
    method: &str,
    endpoint: &str,
    status: u16,
    duration_ms: u64,
    correlation_id: &str,
) {
    let level = if status >= 500 {
        LogLevel::Error
    } else if status >= 400 {
        LogLevel::Warn
    } else {
        LogLevel::Debug
    };

    let event = LogEvent::new(
        level,
        EventCategory::Gateway,
        format!("{} {} -> {}", method, endpoint, status),
    )
    .with_correlation_id(correlation_id)
    .with_duration(duration_ms);

    match level {
        LogLevel::Error => tracing::error!(target: "market_deposit::gateway", "{}", event.to_json()),
        LogLevel::Warn => tracing::warn!(target: "market_deposit::gateway", "{}", event.to_json()),
        _ => tracing::debug!(target: "market_deposit::gateway", "{}", event.to_json()),
    }
}

/// Log a deposit lifecycle event
pub fn log_deposit_event(
    event_type: &str,
    memo: &str,
    amount: &str,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Deposit, event_type)
        .with_correlation_id(memo)
        .with_data(serde_json::json!({
            "memo": memo,
            "amount": amount,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("DEPOSIT_ERROR", err);
    }

    if success {
        tracing::info!(target: "market_deposit::deposit", "{}", event.to_json());
    } else {
        tracing::warn!(target: "market_deposit::deposit", "{}", event.to_json());
    }
}

/// Build a wallet interaction event; `outcome` is e.g. "sent" or "rejected"
pub fn wallet_event(action: &str, memo: &str, outcome: &str, error: Option<&str>) -> LogEvent {
    let level = if error.is_some() { LogLevel::Error } else { LogLevel::Info };
    let mut event = LogEvent::new(level, EventCategory::Wallet, action)
        .with_correlation_id(memo)
        .with_data(serde_json::json!({
            "memo": memo,
            "outcome": outcome
        }));

    if let Some(err) = error {
        event = event.with_error("WALLET_ERROR", err);
    }
    event
}

/// Log a wallet interaction
pub fn log_wallet_event(action: &str, memo: &str, outcome: &str, error: Option<&str>) {
    let event = wallet_event(action, memo, outcome, error);
    if error.is_some() {
        tracing::error!(target: "market_deposit::wallet", "{}", event.to_json());
    } else {
        tracing::info!(target: "market_deposit::wallet", "{}", event.to_json());
    }
}

/// Build an address cache event; `operation` is "hit", "miss", "write" or "clear"
pub fn cache_event(operation: &str, currency: &str, error: Option<&str>) -> LogEvent {
    let level = if error.is_some() { LogLevel::Warn } else { LogLevel::Debug };
    let mut event = LogEvent::new(level, EventCategory::Cache, format!("cache {}", operation))
        .with_data(serde_json::json!({
            "operation": operation,
            "currency": currency
        }));

    if let Some(err) = error {
        event = event.with_error("CACHE_ERROR", err);
    }
    event
}

/// Log an address cache read or write
pub fn log_cache_event(operation: &str, currency: &str, error: Option<&str>) {
    let event = cache_event(operation, currency, error);
    if error.is_some() {
        tracing::warn!(target: "market_deposit::cache", "{}", event.to_json());
    } else {
        tracing::debug!(target: "market_deposit::cache", "{}", event.to_json());
    }
}

pub fn system_event(message: &str, data: serde_json::Value) -> LogEvent {
    LogEvent::new(LogLevel::Info, EventCategory::System, message).with_data(data)
}

/// Log startup or shutdown
pub fn log_system_event(message: &str, data: serde_json::Value) {
    let event = system_event(message, data);
    tracing::info!(target: "market_deposit::system", "{}", event.to_json());
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("market_deposit={}", level.as_filter())));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        registry
            .with(fmt::layer().compact().with_target(true))
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from the application config
pub fn init_from_config(config: &super::config::AppConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID for a watch session
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
