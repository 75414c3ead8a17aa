//! Wallet Connector
//!
//! The signing context lives outside this crate (a browser wallet, a mobile
//! app behind a bridge, ...). `WalletConnector` is the seam: it reports the
//! connected account, owns the binary encoding of transfer comments, and
//! returns a structured outcome so callers never inspect error text.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use super::types::{SendOutcome, TransactionRequest, WalletError};

/// Op code that marks a transfer body as a plain text comment
const TEXT_COMMENT_OP: [u8; 4] = [0, 0, 0, 0];

/// Connection to the user's wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Address of the connected account, `None` when disconnected
    fn account(&self) -> Option<String>;

    /// Encode a comment into the opaque payload carried by a transfer.
    ///
    /// The default is [`encode_text_comment`], which only connectors that
    /// decode it themselves understand (such as [`DeepLinkWallet`]). A
    /// connector handing the payload to a TON Connect wallet must override
    /// this and return a base64 BoC holding the comment cell; wallets reject
    /// the raw body.
    ///
    /// [`DeepLinkWallet`]: super::DeepLinkWallet
    fn encode_comment(&self, comment: &str) -> String {
        encode_text_comment(comment)
    }

    /// Ask the wallet to sign and broadcast
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SendOutcome, WalletError>;
}

/// Text-comment body: a zero op code followed by the UTF-8 text, base64.
///
/// This is the raw body only, not a serialised cell (no BoC header, no
/// snake-cell split past 127 bytes), so it is not a valid TON Connect
/// `payload` on its own.
pub fn encode_text_comment(comment: &str) -> String {
    let mut body = Vec::with_capacity(TEXT_COMMENT_OP.len() + comment.len());
    body.extend_from_slice(&TEXT_COMMENT_OP);
    body.extend_from_slice(comment.as_bytes());
    STANDARD.encode(body)
}

/// Inverse of [`encode_text_comment`]; `None` for anything that is not a
/// text-comment body
pub fn decode_text_comment(payload: &str) -> Option<String> {
    let body = STANDARD.decode(payload).ok()?;
    let text = body.strip_prefix(&TEXT_COMMENT_OP[..])?;
    String::from_utf8(text.to_vec()).ok()
}

/// Known cancellation phrases emitted by wallet UIs
const CANCELLATION_MARKERS: [&str; 5] = ["reject", "cancel", "declined", "user closed", "aborted"];

/// Map a failure message to an outcome, for connectors whose underlying SDK
/// only reports cancellations as error text.
pub fn classify_wallet_message(message: &str) -> Result<SendOutcome, WalletError> {
    let lower = message.to_lowercase();
    if CANCELLATION_MARKERS.iter().any(|m| lower.contains(m)) {
        Ok(SendOutcome::Rejected)
    } else {
        Err(WalletError::Failed(message.to_string()))
    }
}
