//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the deposit tooling.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{AppConfig, ConfigError, GatewayConfig};
pub use error::{AppError, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_deposit_event,
    log_gateway_request, log_gateway_response, ErrorDetails, EventCategory, LogEvent, LogLevel,
    LoggingError,
};
