//! Wallet Request Types
//!
//! Shapes exchanged with the wallet-connect collaborator.

use serde::{Deserialize, Serialize};

/// One transfer inside a wallet transaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMessage {
    /// Destination address
    pub address: String,
    /// Amount in minor units
    pub amount: String,
    /// Base64-encoded binary comment, opaque to this crate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Transaction submission request handed to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Unix seconds after which the wallet must refuse to sign
    pub valid_until: i64,
    pub messages: Vec<TransferMessage>,
}

/// Result of asking the wallet to sign and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Signed and handed to the network; `boc` is the signed message if the
    /// connector returns one
    Sent { boc: Option<String> },
    /// The user declined or closed the signing prompt
    Rejected,
}

/// Wallet errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,

    #[error("wallet request failed: {0}")]
    Failed(String),
}
