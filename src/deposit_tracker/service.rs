//! Deposit Flow Service
//!
//! Orchestrates one deposit attempt:
//!
//! 1. Resolve the user id (host > local > wallet address)
//! 2. Provision (or reuse) the deposit address
//! 3. Submit the memo-tagged transfer to the wallet
//! 4. Poll the gateway until the income shows up or the budget runs out
//!
//! The flow owns the `DepositStatus` and allows a single active deposit:
//! starting another while one is in flight fails with `DepositInProgress`.
//! `cancel()` works at any stage: before the watch exists it is recorded and
//! the deposit stops at the next step instead of prompting the wallet or
//! spawning the watch.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::poller::{DepositPoller, WatchHandle};
use super::provisioner::AddressProvisioner;
use super::submitter::TransactionSubmitter;
use super::types::{DepositError, DepositIntent, DepositStatus, PollerConfig, SubmitterConfig};
use crate::common::logging::log_deposit_event;
use crate::gateway::PaymentGateway;
use crate::identity::IdentityResolver;
use crate::storage::AddressCache;
use crate::units::{parse_amount, Asset};
use crate::wallet::WalletConnector;

/// Ends the starting phase; also resets the status to idle unless disarmed
struct ClaimGuard<'a> {
    flow: &'a DepositFlow,
    armed: bool,
}

impl ClaimGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.flow.lock_active().starting = false;
        if self.armed {
            self.flow.status.send_replace(DepositStatus::Idle);
        }
    }
}

/// The watch being tracked, plus teardown requested before it existed
#[derive(Default)]
struct Active {
    watch: Option<WatchHandle>,
    starting: bool,
    cancel_requested: bool,
}

/// Deposit flow controller
pub struct DepositFlow {
    identity: IdentityResolver,
    wallet: Arc<dyn WalletConnector>,
    provisioner: AddressProvisioner,
    submitter: TransactionSubmitter,
    poller: DepositPoller,
    status: Arc<watch::Sender<DepositStatus>>,
    active: Mutex<Active>,
}

impl DepositFlow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<dyn AddressCache>,
        wallet: Arc<dyn WalletConnector>,
        identity: IdentityResolver,
        asset: Asset,
        poller_config: PollerConfig,
        submitter_config: SubmitterConfig,
    ) -> Self {
        let (status, _) = watch::channel(DepositStatus::Idle);

        Self {
            identity,
            provisioner: AddressProvisioner::new(gateway.clone(), cache),
            submitter: TransactionSubmitter::new(wallet.clone(), submitter_config, asset.clone()),
            poller: DepositPoller::new(gateway, poller_config, asset),
            wallet,
            status: Arc::new(status),
            active: Mutex::new(Active::default()),
        }
    }

    /// Current status
    pub fn status(&self) -> DepositStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<DepositStatus> {
        self.status.subscribe()
    }

    pub fn provisioner(&self) -> &AddressProvisioner {
        &self.provisioner
    }

    pub fn asset(&self) -> &Asset {
        self.submitter.asset()
    }

    /// Start a deposit of `amount` (display units).
    ///
    /// Returns `Ok(None)` if the user declined in the wallet or the flow was
    /// cancelled before the watch started; the status is back to idle in
    /// both cases. On success the deposit is being watched
    /// and exactly one of the callbacks fires unless [`cancel`](Self::cancel)
    /// is called first.
    pub async fn deposit<C, T>(
        &self,
        amount: &str,
        on_confirmed: C,
        on_timeout: T,
    ) -> Result<Option<DepositIntent>, DepositError>
    where
        C: FnOnce(Decimal) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let claimed = self.status.send_if_modified(|status| {
            if *status == DepositStatus::Idle {
                *status = DepositStatus::Pending;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(DepositError::DepositInProgress);
        }
        let guard = ClaimGuard {
            flow: self,
            armed: true,
        };
        {
            let mut active = self.lock_active();
            active.starting = true;
            active.cancel_requested = false;
        }

        match self.start(amount, on_confirmed, on_timeout).await {
            Ok(intent) => {
                guard.disarm();
                Ok(Some(intent))
            }
            Err(DepositError::SubmissionRejected) => Ok(None),
            Err(DepositError::Cancelled) => {
                tracing::info!("deposit cancelled before the watch started");
                log_deposit_event("deposit_cancelled", "", amount, false, None);
                Ok(None)
            }
            Err(e) => {
                log_deposit_event("deposit_failed", "", amount, false, Some(&e.to_string()));
                Err(e)
            }
        }
    }

    async fn start<C, T>(
        &self,
        amount: &str,
        on_confirmed: C,
        on_timeout: T,
    ) -> Result<DepositIntent, DepositError>
    where
        C: FnOnce(Decimal) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let wallet_address = self.wallet.account().ok_or(DepositError::WalletNotConnected)?;
        parse_amount(amount, self.submitter.asset())?;

        let identity = self.identity.resolve(&wallet_address);
        tracing::debug!(user_id = %identity.user_id, source = ?identity.source, "resolved deposit identity");

        let currency = self.submitter.asset().symbol.clone();
        let address = self
            .provisioner
            .get_or_create_deposit_address(&identity.user_id, &currency)
            .await?;
        self.ensure_not_cancelled()?;

        let intent = self
            .submitter
            .submit_deposit(&address, amount, &identity.user_id)
            .await?;
        log_deposit_event("deposit_submitted", intent.memo(), amount, true, None);

        // Checked and installed under one lock so a concurrent cancel() either
        // sees the watch or is seen here
        let previous = {
            let mut active = self.lock_active();
            if active.cancel_requested {
                return Err(DepositError::Cancelled);
            }
            let handle = self.poller.spawn_watch(
                intent.clone(),
                self.status.clone(),
                on_confirmed,
                on_timeout,
            );
            active.watch.replace(handle)
        };
        drop(previous);

        Ok(intent)
    }

    fn ensure_not_cancelled(&self) -> Result<(), DepositError> {
        if self.lock_active().cancel_requested {
            return Err(DepositError::Cancelled);
        }
        Ok(())
    }

    /// Tear down the deposit in flight, if any. Returns whether one was.
    ///
    /// Before the watch exists (provisioning or awaiting the wallet) the
    /// request is recorded: `deposit()` then returns `Ok(None)` without
    /// spawning the watch, and no callback fires.
    pub fn cancel(&self) -> bool {
        let handle = {
            let mut active = self.lock_active();
            match active.watch.take() {
                Some(handle) => handle,
                None if active.starting => {
                    active.cancel_requested = true;
                    return true;
                }
                None => return false,
            }
        };
        let running = !handle.is_finished();
        handle.cancel();
        running
    }

    /// Take ownership of the active watch, e.g. to await its outcome.
    /// Dropping the returned handle cancels the watch.
    pub fn take_watch(&self) -> Option<WatchHandle> {
        self.lock_active().watch.take()
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit_tracker::types::WatchOutcome;
    use crate::gateway::{
        DepositHistoryResponse, GatewayError, HistoryQuery, IncomeRecord, MockPaymentGateway,
        NewAddressRequest, NewAddressResponse,
    };
    use crate::identity::{HostIdentity, StaticHostIdentity};
    use crate::storage::MemoryAddressCache;
    use crate::wallet::{MockWalletConnector, SendOutcome};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};

    fn gateway_with_match() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_address().returning(|_| {
            Ok(NewAddressResponse {
                address: "EQ_deposit".to_string(),
                user_id: None,
            })
        });
        gateway.expect_deposit_history().returning(|_| {
            Ok(DepositHistoryResponse {
                incomes: vec![IncomeRecord {
                    comment: String::new(),
                    amount: "500000000".to_string(),
                    tx_hash: "tx-1".to_string(),
                    deposit_address: "EQ_deposit".to_string(),
                    source_address: None,
                    time: chrono::Utc::now().timestamp(),
                }],
                total_incomes: Some(1),
            })
        });
        gateway
    }

    fn wallet(account: Option<&str>, outcome: SendOutcome) -> MockWalletConnector {
        let account = account.map(str::to_string);
        let mut wallet = MockWalletConnector::new();
        wallet.expect_account().returning(move || account.clone());
        wallet
            .expect_encode_comment()
            .returning(|memo| crate::wallet::encode_text_comment(memo));
        wallet
            .expect_send_transaction()
            .returning(move |_| Ok(outcome.clone()));
        wallet
    }

    fn flow(gateway: MockPaymentGateway, wallet: MockWalletConnector) -> DepositFlow {
        flow_with(Arc::new(gateway), wallet, PollerConfig::default())
    }

    fn flow_with(
        gateway: Arc<dyn PaymentGateway>,
        wallet: MockWalletConnector,
        poller: PollerConfig,
    ) -> DepositFlow {
        let host: Arc<dyn HostIdentity> = Arc::new(StaticHostIdentity::new(Some("777".to_string())));
        DepositFlow::new(
            gateway,
            Arc::new(MemoryAddressCache::new()),
            Arc::new(wallet),
            IdentityResolver::new(Some(host), None),
            Asset::ton(),
            poller,
            SubmitterConfig::default(),
        )
    }

    /// Gateway whose address issuance blocks until released
    #[derive(Default)]
    struct HeldGateway {
        entered: Notify,
        release: Notify,
        history_calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for HeldGateway {
        async fn create_address(
            &self,
            _request: &NewAddressRequest,
        ) -> Result<NewAddressResponse, GatewayError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(NewAddressResponse {
                address: "EQ_deposit".to_string(),
                user_id: None,
            })
        }

        async fn deposit_history(
            &self,
            _query: &HistoryQuery,
        ) -> Result<DepositHistoryResponse, GatewayError> {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(DepositHistoryResponse::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_active_deposit() {
        let flow = flow(
            gateway_with_match(),
            wallet(Some("EQ_sender"), SendOutcome::Sent { boc: None }),
        );

        let intent = flow.deposit("0.5", |_| {}, || {}).await.unwrap().unwrap();
        assert_eq!(intent.user_id(), "777");
        assert_eq!(flow.status(), DepositStatus::Pending);

        let err = flow.deposit("1", |_| {}, || {}).await.unwrap_err();
        assert!(matches!(err, DepositError::DepositInProgress));

        let outcome = flow.take_watch().unwrap().outcome().await;
        assert_eq!(outcome, WatchOutcome::Confirmed(Decimal::from_str("0.5").unwrap()));
        assert_eq!(flow.status(), DepositStatus::Idle);

        assert!(flow.deposit("1", |_| {}, || {}).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejection_returns_to_idle() {
        let flow = flow(gateway_with_match(), wallet(Some("EQ_sender"), SendOutcome::Rejected));

        let result = flow.deposit("0.5", |_| {}, || {}).await.unwrap();
        assert!(result.is_none());
        assert_eq!(flow.status(), DepositStatus::Idle);
        assert!(flow.take_watch().is_none());
    }

    #[tokio::test]
    async fn test_errors_return_to_idle() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_address().never();
        let flow = flow(gateway, wallet(None, SendOutcome::Sent { boc: None }));

        let err = flow.deposit("0.5", |_| {}, || {}).await.unwrap_err();
        assert!(matches!(err, DepositError::WalletNotConnected));
        assert_eq!(flow.status(), DepositStatus::Idle);
    }

    #[tokio::test]
    async fn test_invalid_amount_checked_before_provisioning() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_address().never();
        let flow = flow(gateway, wallet(Some("EQ_sender"), SendOutcome::Sent { boc: None }));

        let err = flow.deposit("-1", |_| {}, || {}).await.unwrap_err();
        assert!(matches!(err, DepositError::InvalidAmount(_)));
        assert_eq!(flow.status(), DepositStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tears_down_watch() {
        let flow = flow(
            gateway_with_match(),
            wallet(Some("EQ_sender"), SendOutcome::Sent { boc: None }),
        );
        let confirmed = Arc::new(Mutex::new(false));
        let flag = confirmed.clone();

        flow.deposit("0.5", move |_| *flag.lock().unwrap() = true, || {})
            .await
            .unwrap();
        let mut status = flow.subscribe();

        assert!(flow.cancel());
        assert!(!flow.cancel());
        assert_eq!(*status.borrow_and_update(), DepositStatus::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!*confirmed.lock().unwrap());
        assert_eq!(flow.status(), DepositStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_from_confirmation_callback() {
        let poller = PollerConfig {
            initial_delay: Duration::from_millis(10),
            confirmed_display: Duration::from_secs(60),
            ..PollerConfig::default()
        };
        let flow = Arc::new(flow_with(
            Arc::new(gateway_with_match()),
            wallet(Some("EQ_sender"), SendOutcome::Sent { boc: None }),
            poller,
        ));

        // The success handler closes the deposit view, tearing the flow down
        let (done_tx, done_rx) = oneshot::channel();
        let weak = Arc::downgrade(&flow);
        flow.deposit(
            "0.5",
            move |amount| {
                let torn_down = weak.upgrade().map(|flow| flow.cancel());
                let _ = done_tx.send((amount, torn_down));
            },
            || {},
        )
        .await
        .unwrap()
        .unwrap();

        let (amount, torn_down) = tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .expect("callback returned")
            .unwrap();
        assert_eq!(amount, Decimal::from_str("0.5").unwrap());
        assert_eq!(torn_down, Some(true));

        // Idle right away, not after the display delay
        assert_eq!(flow.status(), DepositStatus::Idle);
        assert!(flow.take_watch().is_none());
        assert!(!flow.cancel());

        // The flow is usable again
        let next = flow.deposit("1", |_| {}, || {}).await.unwrap();
        assert!(next.is_some());
        assert!(flow.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_provisioning_skips_wallet_and_watch() {
        let gateway = Arc::new(HeldGateway::default());
        let mut wallet = MockWalletConnector::new();
        wallet
            .expect_account()
            .returning(|| Some("EQ_sender".to_string()));
        wallet.expect_encode_comment().never();
        wallet.expect_send_transaction().never();
        let flow = flow_with(gateway.clone(), wallet, PollerConfig::default());

        let confirmations = Arc::new(AtomicUsize::new(0));
        let counter = confirmations.clone();
        let deposit = flow.deposit(
            "0.5",
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        let teardown = async {
            gateway.entered.notified().await;
            assert_eq!(flow.status(), DepositStatus::Pending);
            let cancelled = flow.cancel();
            gateway.release.notify_one();
            cancelled
        };

        let (result, cancelled) = tokio::join!(deposit, teardown);
        assert!(cancelled);
        assert!(result.unwrap().is_none());
        assert_eq!(flow.status(), DepositStatus::Idle);
        assert!(flow.take_watch().is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.history_calls.load(Ordering::SeqCst), 0);
        assert_eq!(confirmations.load(Ordering::SeqCst), 0);

        // Nothing in flight any more
        assert!(!flow.cancel());
    }
}
