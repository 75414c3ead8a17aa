//! Wallet Module
//!
//! Interface to the user's signing wallet plus a deep-link implementation
//! for environments without an embedded wallet.

pub mod connector;
pub mod deep_link;
pub mod types;

#[cfg(test)]
pub use connector::MockWalletConnector;
pub use connector::{
    classify_wallet_message, decode_text_comment, encode_text_comment, WalletConnector,
};
pub use deep_link::{DeepLinkWallet, LinkPresenter};
pub use types::{SendOutcome, TransactionRequest, TransferMessage, WalletError};
