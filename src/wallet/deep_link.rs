//! Deep-link wallet for headless use
//!
//! Renders each transfer as a `ton://transfer/...` link and hands it to a
//! presenter (stdout in the CLI). Any wallet app that opens the link signs
//! and broadcasts on the user's behalf; from this crate's point of view the
//! request is sent as soon as the link is presented.

use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;

use super::connector::{decode_text_comment, WalletConnector};
use super::types::{SendOutcome, TransactionRequest, TransferMessage, WalletError};

/// Callback that shows a link to the user
pub type LinkPresenter = Arc<dyn Fn(&str) + Send + Sync>;

/// Wallet connector backed by transfer deep links
pub struct DeepLinkWallet {
    account: Option<String>,
    presenter: LinkPresenter,
}

impl DeepLinkWallet {
    /// `account` is the sender address if known; the link flow does not need
    /// it, but the deposit flow treats `None` as "not connected".
    pub fn new(account: Option<String>, presenter: LinkPresenter) -> Self {
        Self { account, presenter }
    }

    /// Build the deep link for one transfer
    pub fn transfer_link(message: &TransferMessage) -> Result<String, WalletError> {
        let mut url = Url::parse(&format!("ton://transfer/{}", message.address))
            .map_err(|e| WalletError::Failed(format!("invalid address: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("amount", &message.amount);
            match message.payload.as_deref().map(|p| (p, decode_text_comment(p))) {
                Some((_, Some(text))) => {
                    query.append_pair("text", &text);
                }
                Some((raw, None)) => {
                    query.append_pair("bin", raw);
                }
                None => {}
            }
        }

        Ok(url.to_string())
    }
}

#[async_trait]
impl WalletConnector for DeepLinkWallet {
    fn account(&self) -> Option<String> {
        self.account.clone()
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SendOutcome, WalletError> {
        if self.account.is_none() {
            return Err(WalletError::NotConnected);
        }
        if request.messages.is_empty() {
            return Err(WalletError::Failed("transaction has no messages".to_string()));
        }

        for message in &request.messages {
            let link = Self::transfer_link(message)?;
            tracing::info!(address = %message.address, amount = %message.amount, "presenting transfer link");
            (self.presenter)(&link);
        }

        Ok(SendOutcome::Sent { boc: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::connector::encode_text_comment;
    use std::sync::Mutex;

    fn recording_wallet() -> (DeepLinkWallet, Arc<Mutex<Vec<String>>>) {
        let links = Arc::new(Mutex::new(Vec::new()));
        let sink = links.clone();
        let wallet = DeepLinkWallet::new(
            Some("EQ_sender".to_string()),
            Arc::new(move |link: &str| sink.lock().unwrap().push(link.to_string())),
        );
        (wallet, links)
    }

    #[test]
    fn test_transfer_link_carries_text_comment() {
        let link = DeepLinkWallet::transfer_link(&TransferMessage {
            address: "EQ_dest".to_string(),
            amount: "500000000".to_string(),
            payload: Some(encode_text_comment("DEP-1700000000000-aZ09xy")),
        })
        .unwrap();

        assert_eq!(
            link,
            "ton://transfer/EQ_dest?amount=500000000&text=DEP-1700000000000-aZ09xy"
        );
    }

    #[tokio::test]
    async fn test_send_presents_each_message() {
        let (wallet, links) = recording_wallet();
        let request = TransactionRequest {
            valid_until: 0,
            messages: vec![TransferMessage {
                address: "EQ_dest".to_string(),
                amount: "1".to_string(),
                payload: None,
            }],
        };

        let outcome = wallet.send_transaction(&request).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent { boc: None });
        assert_eq!(links.lock().unwrap().as_slice(), ["ton://transfer/EQ_dest?amount=1"]);
    }

    #[tokio::test]
    async fn test_disconnected_wallet() {
        let wallet = DeepLinkWallet::new(None, Arc::new(|_: &str| {}));
        let request = TransactionRequest {
            valid_until: 0,
            messages: vec![],
        };
        assert_eq!(
            wallet.send_transaction(&request).await,
            Err(WalletError::NotConnected)
        );
    }
}
