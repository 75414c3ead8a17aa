//! Marketplace Deposit Flow
//!
//! Wallet deposits for the marketplace mini-app, reconciled against a
//! custodial payment gateway.
//!
//! ## Flow
//!
//! 1. **Address Provisioner** - Issues (and caches) the user's deposit address
//! 2. **Transaction Submitter** - Sends a memo-tagged transfer through the wallet
//! 3. **Deposit Poller** - Polls deposit history until the memo shows up
//!
//! ## Collaborators
//!
//! - Payment gateway HTTP API (`gateway`)
//! - Wallet connector (`wallet`)
//! - Host identity bridge (`identity`)

pub mod common;
pub mod deposit_tracker;
pub mod gateway;
pub mod identity;
pub mod storage;
pub mod units;
pub mod wallet;

// Re-exports: Common
pub use common::{AppConfig, AppError, ConfigError};

// Re-exports: Deposit flow
pub use deposit_tracker::{
    AddressProvisioner, DepositError, DepositFlow, DepositIntent, DepositPoller, DepositStatus,
    PollerConfig, SubmitterConfig, TransactionSubmitter, WatchHandle, WatchOutcome,
};

// Re-exports: Gateway client
pub use gateway::{GatewayClient, GatewayError, IncomeRecord, PaymentGateway};

// Re-exports: Identity
pub use identity::{HostIdentity, IdentityResolver, StaticHostIdentity};

// Re-exports: Address cache
pub use storage::{AddressCache, CachedAddress, MemoryAddressCache, SqliteAddressCache};

// Re-exports: Units
pub use units::{format_amount, from_minor_units, parse_amount, to_minor_units, Asset};

// Re-exports: Wallet
pub use wallet::{DeepLinkWallet, SendOutcome, WalletConnector, WalletError};
