//! Deposit Poller
//!
//! Polls the gateway's deposit history until an income matching a submitted
//! intent shows up or the retry budget runs out.
//!
//! ```text
//! pending ──match──▶ confirmed ──(display delay)──▶ idle
//!    │
//!    └──budget exhausted──▶ failed ──(display delay)──▶ idle
//! ```
//!
//! Each watch runs as its own task. The returned [`WatchHandle`] cancels it;
//! once `cancel()` returns no callback will fire and no further check runs.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::types::{DepositIntent, DepositStatus, PollerConfig, WatchOutcome};
use crate::common::logging::{generate_correlation_id, log_deposit_event};
use crate::gateway::{HistoryQuery, IncomeRecord, PaymentGateway};
use crate::units::{format_amount, from_minor_units, Asset};

/// Clock skew tolerated between the gateway's income timestamps and ours
pub const ADDRESS_MATCH_SKEW_SECS: i64 = 60;

/// Find the income that settles `intent`.
///
/// A comment equal to the memo wins; otherwise the first income to the
/// intent's deposit address is taken, for gateways and wallets that strip
/// comments. The gateway issues one address per user, so the fallback only
/// considers incomes stamped no earlier than the intent (less
/// [`ADDRESS_MATCH_SKEW_SECS`]). An unrelated transfer to the same address
/// inside that window can still match.
pub fn find_matching_income<'a>(
    intent: &DepositIntent,
    incomes: &'a [IncomeRecord],
) -> Option<&'a IncomeRecord> {
    let not_before = intent.created_at().timestamp() - ADDRESS_MATCH_SKEW_SECS;
    incomes
        .iter()
        .find(|income| income.comment == intent.memo())
        .or_else(|| {
            incomes.iter().find(|income| {
                income.deposit_address == intent.deposit_address() && income.time >= not_before
            })
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    /// Confirmed or failed, holding the status for display
    Resolved,
    /// Back to idle
    Released,
    Cancelled,
}

/// Shared between a watch task and its handle.
///
/// Status changes happen with `phase` locked so they cannot interleave with
/// `cancel()`. Callbacks run outside that lock while `callback` is held; a
/// `cancel()` from another thread waits on `callback`, one from inside the
/// callback itself does not.
struct Gate {
    phase: Mutex<Phase>,
    callback: Mutex<()>,
    callback_thread: Mutex<Option<ThreadId>>,
    cancel_tx: watch::Sender<bool>,
    status: Arc<watch::Sender<DepositStatus>>,
}

/// Clears the recorded callback thread, also when the callback panics
struct CallbackScope<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> CallbackScope<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *relock(slot) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        *relock(self.0) = None;
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Gate {
    fn new(cancel_tx: watch::Sender<bool>, status: Arc<watch::Sender<DepositStatus>>) -> Self {
        Self {
            phase: Mutex::new(Phase::Running),
            callback: Mutex::new(()),
            callback_thread: Mutex::new(None),
            cancel_tx,
            status,
        }
    }

    /// Move Running -> Resolved, publishing `status`, then run `notify`.
    /// Returns false if the watch was cancelled first.
    fn resolve(&self, status: DepositStatus, notify: impl FnOnce()) -> bool {
        let _running = relock(&self.callback);
        {
            let mut phase = relock(&self.phase);
            if *phase != Phase::Running {
                return false;
            }
            *phase = Phase::Resolved;
            self.status.send_replace(status);
        }

        let _scope = CallbackScope::enter(&self.callback_thread);
        notify();
        true
    }

    fn release(&self) {
        let mut phase = relock(&self.phase);
        if *phase == Phase::Resolved {
            *phase = Phase::Released;
            self.status.send_replace(DepositStatus::Idle);
        }
    }

    fn in_callback(&self) -> bool {
        *relock(&self.callback_thread) == Some(thread::current().id())
    }

    fn cancel(&self) -> bool {
        let cancelled = {
            let mut phase = relock(&self.phase);
            match *phase {
                Phase::Running | Phase::Resolved => {
                    *phase = Phase::Cancelled;
                    self.status.send_replace(DepositStatus::Idle);
                    true
                }
                Phase::Released | Phase::Cancelled => false,
            }
        };
        self.cancel_tx.send_replace(true);

        // A callback already past the phase check finishes before we return
        if !self.in_callback() {
            drop(relock(&self.callback));
        }
        cancelled
    }
}

/// Resolves once the watch is cancelled
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Handle to a running watch
///
/// Dropping the handle cancels the watch.
pub struct WatchHandle {
    memo: String,
    gate: Arc<Gate>,
    task: Option<JoinHandle<WatchOutcome>>,
}

impl WatchHandle {
    pub fn memo(&self) -> &str {
        &self.memo
    }

    /// Stop the watch. No callback fires after this returns.
    ///
    /// May be called from inside `on_confirmed`/`on_timeout`; the status
    /// goes back to idle without waiting out the display delay.
    pub fn cancel(&self) {
        if self.gate.cancel() {
            tracing::info!(memo = %self.memo, "deposit watch cancelled");
        }
    }

    /// Whether the watch task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Subscribe to status changes
    pub fn status(&self) -> watch::Receiver<DepositStatus> {
        self.gate.status.subscribe()
    }

    /// Wait for the watch to end, including the post-resolution display delay
    pub async fn outcome(mut self) -> WatchOutcome {
        let Some(task) = self.task.take() else {
            return WatchOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(memo = %self.memo, error = %e, "deposit watch task failed");
                WatchOutcome::Cancelled
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Polls the gateway for a submitted deposit
#[derive(Clone)]
pub struct DepositPoller {
    gateway: Arc<dyn PaymentGateway>,
    config: PollerConfig,
    asset: Asset,
}

impl DepositPoller {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: PollerConfig, asset: Asset) -> Self {
        Self {
            gateway,
            config,
            asset,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start watching for `intent`.
    ///
    /// `on_confirmed` receives the requested amount, not the amount observed
    /// on chain. Exactly one of the callbacks fires unless the watch is
    /// cancelled first, in which case neither does.
    pub fn watch<C, T>(&self, intent: DepositIntent, on_confirmed: C, on_timeout: T) -> WatchHandle
    where
        C: FnOnce(Decimal) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let (status, _) = watch::channel(DepositStatus::Idle);
        self.spawn_watch(intent, Arc::new(status), on_confirmed, on_timeout)
    }

    /// Start a watch publishing to an existing status channel
    pub(crate) fn spawn_watch<C, T>(
        &self,
        intent: DepositIntent,
        status: Arc<watch::Sender<DepositStatus>>,
        on_confirmed: C,
        on_timeout: T,
    ) -> WatchHandle
    where
        C: FnOnce(Decimal) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        status.send_replace(DepositStatus::Pending);

        let gate = Arc::new(Gate::new(cancel_tx, status));

        let span = tracing::info_span!(
            "deposit_watch",
            correlation_id = %generate_correlation_id(),
            memo = %intent.memo()
        );

        let memo = intent.memo().to_string();
        let session = WatchSession {
            gateway: self.gateway.clone(),
            config: self.config.clone(),
            asset: self.asset.clone(),
            intent,
            gate: gate.clone(),
            cancel_rx,
        };
        let task = tokio::spawn(session.run(on_confirmed, on_timeout).instrument(span));

        WatchHandle {
            memo,
            gate,
            task: Some(task),
        }
    }
}

struct WatchSession {
    gateway: Arc<dyn PaymentGateway>,
    config: PollerConfig,
    asset: Asset,
    intent: DepositIntent,
    gate: Arc<Gate>,
    cancel_rx: watch::Receiver<bool>,
}

impl WatchSession {
    async fn run<C, T>(mut self, on_confirmed: C, on_timeout: T) -> WatchOutcome
    where
        C: FnOnce(Decimal) + Send + 'static,
        T: FnOnce() + Send + 'static,
    {
        let requested = self.intent.requested_amount();
        let mut delay = self.config.initial_delay;
        let mut attempts = 0u32;

        tracing::info!(
            address = %self.intent.deposit_address(),
            amount = %format_amount(requested, &self.asset),
            max_attempts = self.config.max_attempts,
            "watching for deposit"
        );

        loop {
            if !self.pause(delay).await {
                return WatchOutcome::Cancelled;
            }

            attempts += 1;
            let query = HistoryQuery::latest(self.intent.user_id(), self.intent.currency())
                .with_limit(self.config.history_limit);

            let result = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel_rx) => return WatchOutcome::Cancelled,
                result = self.gateway.deposit_history(&query) => result,
            };

            match result {
                Ok(history) => {
                    if let Some(income) = find_matching_income(&self.intent, &history.incomes) {
                        return self.confirm(income.clone(), attempts, on_confirmed).await;
                    }
                    tracing::debug!(
                        attempt = attempts,
                        incomes = history.incomes.len(),
                        "no matching deposit yet"
                    );
                    delay = self.config.interval;
                }
                Err(e) => {
                    tracing::warn!(attempt = attempts, error = %e, "deposit history check failed");
                    delay = self.config.error_interval;
                }
            }

            if attempts >= self.config.max_attempts {
                return self.time_out(attempts, on_timeout).await;
            }
        }
    }

    /// Sleep for `delay`; false if cancelled meanwhile
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel_rx) => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn confirm<C>(mut self, income: IncomeRecord, attempts: u32, on_confirmed: C) -> WatchOutcome
    where
        C: FnOnce(Decimal),
    {
        let requested = self.intent.requested_amount();
        let received = match from_minor_units(&income.amount, &self.asset) {
            Ok(amount) => format_amount(amount, &self.asset),
            Err(e) => {
                tracing::warn!(amount = %income.amount, error = %e, "unreadable income amount");
                income.amount.clone()
            }
        };

        let resolved = self
            .gate
            .resolve(DepositStatus::Confirmed, || on_confirmed(requested));
        if !resolved {
            return WatchOutcome::Cancelled;
        }

        tracing::info!(
            attempt = attempts,
            tx_hash = %income.tx_hash,
            received = %received,
            by_memo = income.comment == self.intent.memo(),
            "deposit confirmed"
        );
        log_deposit_event(
            "deposit_confirmed",
            self.intent.memo(),
            &requested.to_string(),
            true,
            None,
        );

        let display = self.config.confirmed_display;
        self.pause(display).await;
        self.gate.release();
        WatchOutcome::Confirmed(requested)
    }

    async fn time_out<T>(mut self, attempts: u32, on_timeout: T) -> WatchOutcome
    where
        T: FnOnce(),
    {
        if !self.gate.resolve(DepositStatus::Failed, on_timeout) {
            return WatchOutcome::Cancelled;
        }

        tracing::warn!(attempts, "no matching deposit, giving up");
        log_deposit_event(
            "deposit_timeout",
            self.intent.memo(),
            &self.intent.requested_amount().to_string(),
            false,
            Some(&format!("no matching deposit after {} checks", attempts)),
        );

        let display = self.config.failed_display;
        self.pause(display).await;
        self.gate.release();
        WatchOutcome::TimedOut
    }
}
