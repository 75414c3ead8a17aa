//! Payment Gateway Module
//!
//! Client for the custodial payment gateway that issues deposit addresses,
//! reports observed incomes and processes withdrawals.
//!
//! ## Endpoints
//!
//! - `POST /v1/address/new` - Issue a deposit address
//! - `GET /v1/address/all` - List a user's addresses
//! - `GET /v1/deposit/history` - Page through observed incomes
//! - `GET /v1/deposit/income` - Look up one income by tx hash
//! - `POST /v1/withdrawal/send` - Queue a withdrawal
//! - `GET /v1/withdrawal/status` - Withdrawal progress
//! - `GET /v1/balance` - Hot wallet / address balance
//! - `GET /v1/system/sync` - Blockchain sync state

pub mod client;
pub mod types;

#[cfg(test)]
pub use client::MockPaymentGateway;
pub use client::{GatewayClient, GatewayError, PaymentGateway, DEFAULT_URL};
pub use types::{
    AccountStatus, BalanceResponse, DepositHistoryResponse, HistoryQuery, IncomeByTxHash,
    IncomeRecord, NewAddressRequest, NewAddressResponse, SortOrder, SyncResponse,
    WithdrawalRequest, WithdrawalResponse, WithdrawalState, WithdrawalStatusResponse,
    DEFAULT_CURRENCY, DEFAULT_HISTORY_LIMIT,
};
