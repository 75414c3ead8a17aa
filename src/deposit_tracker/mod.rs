//! Deposit Tracker Module
//!
//! Tracks a user-initiated deposit from submission to confirmation:
//!
//! ```text
//! IDLE → PENDING → CONFIRMED → IDLE
//!            └───→ FAILED ───→ IDLE
//! ```
//!
//! ## Components
//!
//! - **types**: Intent, status, configs and the error taxonomy
//! - **provisioner**: Deposit address issuance behind the address cache
//! - **submitter**: Memo-tagged transfer handed to the wallet
//! - **poller**: Polls the gateway's deposit history for the memo
//! - **service**: Flow controller tying the three together
//!
//! ## Flow Overview
//!
//! 1. Provisioner returns the cached address or asks the gateway for one
//! 2. Submitter generates a unique memo and sends the transfer for signing
//! 3. Poller waits 3s, then checks history every 5s (10s after errors)
//! 4. A memo match (or, failing that, a recent income to the address)
//!    confirms the deposit; 120 unmatched checks fail it

pub mod poller;
pub mod provisioner;
pub mod service;
pub mod submitter;
pub mod types;

// Re-exports
pub use poller::{find_matching_income, DepositPoller, WatchHandle, ADDRESS_MATCH_SKEW_SECS};
pub use provisioner::AddressProvisioner;
pub use service::DepositFlow;
pub use submitter::TransactionSubmitter;
pub use types::{
    generate_memo, DepositError, DepositIntent, DepositStatus, PollerConfig, SubmitterConfig,
    WatchOutcome,
};
