//! Deposit Tracker Types
//!
//! Types for one deposit attempt through its lifecycle:
//! idle → pending → confirmed | failed → idle

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::gateway::GatewayError;
use crate::units::AmountError;

/// Prefix of every deposit memo
pub const MEMO_PREFIX: &str = "DEP";

/// Length of the random memo suffix
pub const MEMO_SUFFIX_LEN: usize = 6;

/// Status of the deposit flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// No deposit in flight
    #[default]
    Idle,
    /// Submitted, waiting for the gateway to report the income
    Pending,
    /// Matching income observed
    Confirmed,
    /// Retry budget exhausted without a match
    Failed,
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Generate a memo unique per call: `DEP-<unix millis>-<6 alphanumerics>`
pub fn generate_memo() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MEMO_SUFFIX_LEN)
        .map(char::from)
        .collect();

    format!("{}-{}-{}", MEMO_PREFIX, Utc::now().timestamp_millis(), suffix)
}

/// A single submitted transfer awaiting confirmation
///
/// Immutable once created; fields are exposed through getters only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    memo: String,
    requested_amount: Decimal,
    deposit_address: String,
    user_id: String,
    currency: String,
    created_at: DateTime<Utc>,
}

impl DepositIntent {
    pub fn new(
        memo: impl Into<String>,
        requested_amount: Decimal,
        deposit_address: impl Into<String>,
        user_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            memo: memo.into(),
            requested_amount,
            deposit_address: deposit_address.into(),
            user_id: user_id.into(),
            currency: currency.into(),
            created_at: Utc::now(),
        }
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    /// Amount the user asked to deposit, reported on confirmation
    pub fn requested_amount(&self) -> Decimal {
        self.requested_amount
    }

    pub fn deposit_address(&self) -> &str {
        &self.deposit_address
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Deposit poller timings and budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Grace period before the first check
    pub initial_delay: Duration,
    /// Delay between checks
    pub interval: Duration,
    /// Delay after a check that errored
    pub error_interval: Duration,
    /// Checks before giving up
    pub max_attempts: u32,
    /// History page size per check
    pub history_limit: u32,
    /// How long `Confirmed` is held before returning to idle
    pub confirmed_display: Duration,
    /// How long `Failed` is held before returning to idle
    pub failed_display: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            interval: Duration::from_secs(5),
            error_interval: Duration::from_secs(10),
            max_attempts: 120,
            history_limit: 100,
            confirmed_display: Duration::from_secs(3),
            failed_display: Duration::from_secs(10),
        }
    }
}

/// Transaction submitter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterConfig {
    /// Validity window of the signed transfer
    pub validity: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(300),
        }
    }
}

/// How a watch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Matched; carries the requested amount
    Confirmed(Decimal),
    TimedOut,
    Cancelled,
}

/// Deposit flow errors
#[derive(Debug, thiserror::Error)]
pub enum DepositError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("Deposit address unavailable: {0}")]
    AddressUnavailable(String),

    #[error("Transaction rejected by user")]
    SubmissionRejected,

    #[error("Transaction failed: {0}")]
    SubmissionError(String),

    #[error("Polling error: {0}")]
    PollingError(#[from] GatewayError),

    #[error("No matching deposit after {attempts} checks")]
    PollingTimeout { attempts: u32 },

    #[error("A deposit is already in progress")]
    DepositInProgress,

    #[error("Deposit cancelled")]
    Cancelled,
}

impl DepositError {
    /// Errors that return to idle without being shown to the user
    pub fn is_silent(&self) -> bool {
        matches!(self, DepositError::SubmissionRejected | DepositError::Cancelled)
    }

    /// Errors the user can retry by starting the flow again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DepositError::AddressUnavailable(_)
                | DepositError::SubmissionError(_)
                | DepositError::PollingError(_)
                | DepositError::PollingTimeout { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DepositError::WalletNotConnected => "WALLET_NOT_CONNECTED",
            DepositError::InvalidAmount(_) => "INVALID_AMOUNT",
            DepositError::AddressUnavailable(_) => "ADDRESS_UNAVAILABLE",
            DepositError::SubmissionRejected => "SUBMISSION_REJECTED",
            DepositError::SubmissionError(_) => "SUBMISSION_ERROR",
            DepositError::PollingError(_) => "POLLING_ERROR",
            DepositError::PollingTimeout { .. } => "POLLING_TIMEOUT",
            DepositError::DepositInProgress => "DEPOSIT_IN_PROGRESS",
            DepositError::Cancelled => "DEPOSIT_CANCELLED",
        }
    }
}
