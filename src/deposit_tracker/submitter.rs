//! Transaction Submitter
//!
//! Builds a memo-tagged transfer to the deposit address and hands it to the
//! connected wallet. A returned intent means the wallet accepted the request,
//! not that funds arrived.

use chrono::Utc;
use std::sync::Arc;

use super::types::{generate_memo, DepositError, DepositIntent, SubmitterConfig};
use crate::common::logging::log_wallet_event;
use crate::units::{format_amount, parse_amount, to_minor_units, Asset};
use crate::wallet::{SendOutcome, TransactionRequest, TransferMessage, WalletConnector, WalletError};

/// Hands deposit transfers to the wallet
#[derive(Clone)]
pub struct TransactionSubmitter {
    wallet: Arc<dyn WalletConnector>,
    config: SubmitterConfig,
    asset: Asset,
}

impl TransactionSubmitter {
    pub fn new(wallet: Arc<dyn WalletConnector>, config: SubmitterConfig, asset: Asset) -> Self {
        Self {
            wallet,
            config,
            asset,
        }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Submit a deposit of `amount` (display units) to `address`
    pub async fn submit_deposit(
        &self,
        address: &str,
        amount: &str,
        user_id: &str,
    ) -> Result<DepositIntent, DepositError> {
        if self.wallet.account().is_none() {
            return Err(DepositError::WalletNotConnected);
        }

        let requested = parse_amount(amount, &self.asset)?;
        if address.trim().is_empty() {
            return Err(DepositError::AddressUnavailable(
                "no deposit address".to_string(),
            ));
        }

        let memo = generate_memo();
        let request = TransactionRequest {
            valid_until: Utc::now().timestamp() + self.config.validity.as_secs() as i64,
            messages: vec![TransferMessage {
                address: address.to_string(),
                amount: to_minor_units(requested, &self.asset)?,
                payload: Some(self.wallet.encode_comment(&memo)),
            }],
        };

        tracing::info!(
            memo = %memo,
            address,
            amount = %format_amount(requested, &self.asset),
            "submitting deposit transfer"
        );

        match self.wallet.send_transaction(&request).await {
            Ok(SendOutcome::Sent { .. }) => {
                log_wallet_event("send_transaction", &memo, "sent", None);
                Ok(DepositIntent::new(
                    memo,
                    requested,
                    address,
                    user_id,
                    self.asset.symbol.clone(),
                ))
            }
            Ok(SendOutcome::Rejected) => {
                log_wallet_event("send_transaction", &memo, "rejected", None);
                Err(DepositError::SubmissionRejected)
            }
            Err(WalletError::NotConnected) => {
                log_wallet_event("send_transaction", &memo, "not_connected", None);
                Err(DepositError::WalletNotConnected)
            }
            Err(WalletError::Failed(message)) => {
                log_wallet_event("send_transaction", &memo, "failed", Some(&message));
                Err(DepositError::SubmissionError(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::AmountError;
    use crate::wallet::{decode_text_comment, MockWalletConnector};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn connected_wallet() -> MockWalletConnector {
        let mut wallet = MockWalletConnector::new();
        wallet
            .expect_account()
            .returning(|| Some("EQ_sender".to_string()));
        wallet
            .expect_encode_comment()
            .returning(|memo| crate::wallet::encode_text_comment(memo));
        wallet
    }

    fn submitter(wallet: MockWalletConnector) -> TransactionSubmitter {
        TransactionSubmitter::new(Arc::new(wallet), SubmitterConfig::default(), Asset::ton())
    }

    #[tokio::test]
    async fn test_submit_builds_tagged_transfer() {
        let mut wallet = connected_wallet();
        wallet
            .expect_send_transaction()
            .withf(|req| {
                let now = Utc::now().timestamp();
                let msg = &req.messages[0];
                req.messages.len() == 1
                    && msg.address == "EQ_deposit"
                    && msg.amount == "500000000"
                    && msg
                        .payload
                        .as_deref()
                        .and_then(decode_text_comment)
                        .map_or(false, |memo| memo.starts_with("DEP-"))
                    && (req.valid_until - now - 300).abs() <= 2
            })
            .times(1)
            .returning(|_| Ok(SendOutcome::Sent { boc: None }));

        let intent = submitter(wallet)
            .submit_deposit("EQ_deposit", "0.5", "user-1")
            .await
            .unwrap();

        assert!(intent.memo().starts_with("DEP-"));
        assert_eq!(intent.requested_amount(), Decimal::from_str("0.5").unwrap());
        assert_eq!(intent.deposit_address(), "EQ_deposit");
        assert_eq!(intent.user_id(), "user-1");
        assert_eq!(intent.currency(), "TON");
    }

    #[tokio::test]
    async fn test_disconnected_wallet() {
        let mut wallet = MockWalletConnector::new();
        wallet.expect_account().returning(|| None);
        wallet.expect_send_transaction().never();

        let err = submitter(wallet)
            .submit_deposit("EQ_deposit", "1", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::WalletNotConnected));
    }

    #[tokio::test]
    async fn test_invalid_amounts() {
        for (input, expected) in [
            ("", AmountError::Empty),
            ("0", AmountError::NotPositive),
            ("abc", AmountError::Malformed("abc".to_string())),
        ] {
            let mut wallet = connected_wallet();
            wallet.expect_send_transaction().never();

            let err = submitter(wallet)
                .submit_deposit("EQ_deposit", input, "user-1")
                .await
                .unwrap_err();
            match err {
                DepositError::InvalidAmount(e) => assert_eq!(e, expected, "input {:?}", input),
                other => panic!("unexpected error for {:?}: {:?}", input, other),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_address() {
        let mut wallet = connected_wallet();
        wallet.expect_send_transaction().never();

        let err = submitter(wallet)
            .submit_deposit("", "1", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::AddressUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rejection_and_failure_are_distinct() {
        let mut wallet = connected_wallet();
        wallet
            .expect_send_transaction()
            .returning(|_| Ok(SendOutcome::Rejected));
        let err = submitter(wallet)
            .submit_deposit("EQ_deposit", "1", "user-1")
            .await
            .unwrap_err();
        assert!(err.is_silent());

        let mut wallet = connected_wallet();
        wallet
            .expect_send_transaction()
            .returning(|_| Err(WalletError::Failed("bridge timeout".to_string())));
        let err = submitter(wallet)
            .submit_deposit("EQ_deposit", "1", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::SubmissionError(ref m) if m == "bridge timeout"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_each_submission_gets_a_fresh_memo() {
        let mut wallet = connected_wallet();
        wallet
            .expect_send_transaction()
            .times(2)
            .returning(|_| Ok(SendOutcome::Sent { boc: None }));
        let submitter = submitter(wallet);

        let a = submitter.submit_deposit("EQ_deposit", "1", "u").await.unwrap();
        let b = submitter.submit_deposit("EQ_deposit", "1", "u").await.unwrap();
        assert_ne!(a.memo(), b.memo());
    }

    #[tokio::test]
    async fn test_connector_payload_encoding_is_used_verbatim() {
        let mut wallet = MockWalletConnector::new();
        wallet
            .expect_account()
            .returning(|| Some("EQ_sender".to_string()));
        // A connector that serialises comments as cells itself
        wallet
            .expect_encode_comment()
            .times(1)
            .returning(|memo| format!("te6cc-cell:{}", memo));
        wallet
            .expect_send_transaction()
            .withf(|req| {
                req.messages[0]
                    .payload
                    .as_deref()
                    .map_or(false, |p| p.starts_with("te6cc-cell:DEP-"))
            })
            .times(1)
            .returning(|_| Ok(SendOutcome::Sent { boc: None }));

        let intent = submitter(wallet)
            .submit_deposit("EQ_deposit", "0.5", "user-1")
            .await
            .unwrap();
        assert!(intent.memo().starts_with("DEP-"));
    }
}
