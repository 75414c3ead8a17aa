//! Common Error Types
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

use crate::deposit_tracker::DepositError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;
use crate::units::AmountError;
use crate::wallet::WalletError;

/// Root error type for the deposit tooling
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Payment gateway errors
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Address cache errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Wallet errors
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Deposit flow errors
    #[error("deposit error: {0}")]
    Deposit(#[from] DepositError),

    /// Amount parsing errors
    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Gateway(e) => e.is_retryable(),
            AppError::Deposit(e) => e.is_retryable(),
            AppError::Storage(_) | AppError::Io(_) => true,
            _ => false,
        }
    }

    /// Get error code for reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Logging(_) => "LOGGING_ERROR",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Wallet(_) => "WALLET_ERROR",
            AppError::Deposit(e) => e.error_code(),
            AppError::Amount(_) => "INVALID_AMOUNT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AppError::validation("bad tx hash");
        assert!(err.to_string().contains("bad tx hash"));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_retryable_errors() {
        let gateway = AppError::from(GatewayError::Api {
            status: 503,
            body: String::new(),
        });
        assert!(gateway.is_retryable());

        let not_found = AppError::from(GatewayError::Api {
            status: 404,
            body: String::new(),
        });
        assert!(!not_found.is_retryable());

        assert!(!AppError::from(DepositError::SubmissionRejected).is_retryable());
        assert!(AppError::from(DepositError::PollingTimeout { attempts: 120 }).is_retryable());
    }

    #[test]
    fn test_deposit_codes_pass_through() {
        let err = AppError::from(DepositError::WalletNotConnected);
        assert_eq!(err.error_code(), "WALLET_NOT_CONNECTED");
    }
}
