//! Marketplace Deposit CLI
//!
//! Talks to the configured payment gateway and runs the deposit flow from a
//! terminal, with transfers handed out as wallet deep links.

use clap::{Parser, Subcommand};
use market_deposit::common::{self, logging, AppConfig, AppError};
use market_deposit::deposit_tracker::{
    DepositError, DepositFlow, DepositIntent, DepositPoller, WatchOutcome,
};
use market_deposit::gateway::{GatewayClient, HistoryQuery, WithdrawalRequest};
use market_deposit::identity::{HostIdentity, IdentityResolver, StaticHostIdentity};
use market_deposit::storage::{AddressCache, SqliteAddressCache};
use market_deposit::units::{format_amount, from_minor_units, parse_amount, to_minor_units};
use market_deposit::wallet::DeepLinkWallet;
use market_deposit::AddressProvisioner;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "market-deposit")]
#[command(about = "Deposit address, history and reconciliation tooling for the marketplace")]
struct Cli {
    /// Connected wallet address (identity fallback and deposit sender)
    #[arg(short, long, global = true, env = "WALLET_ADDRESS")]
    wallet: Option<String>,

    /// Print the loaded configuration before running
    #[arg(long, global = true)]
    show_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show (or issue) the deposit address for the configured asset
    Address,

    /// List every address issued to the user
    Addresses,

    /// Show recent deposits
    History {
        /// Page size
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Look up one deposit by transaction hash
    Income { tx_hash: String },

    /// Show the hot wallet (or an address) balance
    Balance {
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Show the gateway's blockchain sync state
    Sync,

    /// Queue a withdrawal
    Withdraw {
        destination: String,
        /// Amount in display units, e.g. 1.5
        amount: String,
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Show a withdrawal's progress
    WithdrawalStatus { id: u64 },

    /// Run a full deposit: provision, submit via deep link, wait for the income
    Deposit {
        /// Amount in display units, e.g. 0.5
        amount: String,
    },

    /// Wait for an already-submitted transfer carrying `memo`
    Watch { memo: String, amount: String },

    /// Forget cached deposit addresses
    ClearCache,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = logging::init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }
    if cli.show_config {
        config.print_summary();
    }
    logging::log_system_event(
        "started",
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "gateway": config.gateway.base_url,
            "asset": config.asset.symbol,
        }),
    );

    if let Err(e) = run(cli, config).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        if e.is_retryable() {
            eprintln!("This error is temporary; try again.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AppConfig) -> common::Result<()> {
    let gateway = Arc::new(GatewayClient::new(
        &config.gateway.base_url,
        config.gateway.api_key.clone(),
    )?);
    let host: Arc<dyn HostIdentity> =
        Arc::new(StaticHostIdentity::new(config.host_user_id.clone()));
    let identity = IdentityResolver::new(Some(host), config.user_id.clone());
    let user_id = || -> common::Result<String> {
        let resolved = identity.resolve(cli.wallet.as_deref().unwrap_or_default());
        if resolved.user_id.is_empty() {
            return Err(AppError::validation(
                "no user id: set TELEGRAM_USER_ID, DEPOSIT_USER_ID or --wallet",
            ));
        }
        Ok(resolved.user_id)
    };
    let asset = config.asset.clone();

    match &cli.command {
        Commands::Address => {
            let cache = open_cache(&config)?;
            let provisioner = AddressProvisioner::new(gateway.clone(), cache);
            let address = provisioner
                .get_or_create_deposit_address(&user_id()?, &asset.symbol)
                .await?;
            println!("{}", address);
        }

        Commands::Addresses => {
            for entry in gateway.get_all_addresses(&user_id()?).await? {
                println!("{}", entry.address);
            }
        }

        Commands::History { limit } => {
            let query = HistoryQuery::latest(user_id()?, asset.symbol.clone()).with_limit(*limit);
            let history = gateway.get_deposit_history(&query).await?;
            if history.incomes.is_empty() {
                println!("No deposits yet");
            }
            for income in &history.incomes {
                let amount = from_minor_units(&income.amount, &asset)?;
                println!(
                    "{}  {:>20}  {}  {}",
                    income.time,
                    format_amount(amount, &asset),
                    income.tx_hash,
                    if income.comment.is_empty() { "-" } else { income.comment.as_str() }
                );
            }
            if let Some(total) = history.total_incomes {
                println!("({} of {} shown)", history.incomes.len(), total);
            }
        }

        Commands::Income { tx_hash } => {
            let income = gateway.get_deposit_income(tx_hash).await?;
            println!("Currency: {}", income.currency);
            println!("Amount:   {} (minor units)", income.amount);
            println!("To:       {}", income.deposit_address);
            if let Some(from) = &income.source_address {
                println!("From:     {}", from);
            }
            if let Some(comment) = &income.comment {
                println!("Comment:  {}", comment);
            }
        }

        Commands::Balance { address } => {
            let balance = gateway.get_balance(&asset.symbol, address.as_deref()).await?;
            println!("Balance: {} {}", balance.balance, balance.currency);
            if let Some(status) = balance.status {
                println!("Status:  {:?}", status);
            }
            if let Some(pending) = &balance.total_pending_amount {
                println!("Pending: {}", pending);
            }
            if let Some(processing) = &balance.total_processing_amount {
                println!("Processing: {}", processing);
            }
        }

        Commands::Sync => {
            let sync = gateway.get_system_sync().await?;
            println!(
                "Synced: {} (last block at {})",
                sync.synced, sync.last_block_utime
            );
        }

        Commands::Withdraw {
            destination,
            amount,
            comment,
        } => {
            let value = parse_amount(amount, &asset)?;
            let request = WithdrawalRequest {
                destination: destination.clone(),
                amount: to_minor_units(value, &asset)?,
                comment: comment.clone(),
                user_id: user_id().ok(),
                binary_comment: None,
            };
            let response = gateway.send_withdrawal(&request).await?;
            println!("Withdrawal {} queued ({})", response.id, format_amount(value, &asset));
            if let Some(memo) = response.memo {
                println!("Memo: {}", memo);
            }
        }

        Commands::WithdrawalStatus { id } => {
            let status = gateway.get_withdrawal_status(*id).await?;
            println!("Status: {}", status.status);
            if let Some(tx_hash) = &status.tx_hash {
                println!("Tx:     {}", tx_hash);
            }
        }

        Commands::Deposit { amount } => {
            let wallet = DeepLinkWallet::new(
                cli.wallet.clone(),
                Arc::new(|link: &str| println!("Open in your wallet:\n  {}", link)),
            );
            let flow = DepositFlow::new(
                gateway.clone(),
                open_cache(&config)?,
                Arc::new(wallet),
                identity.clone(),
                asset.clone(),
                config.poller.clone(),
                config.submitter.clone(),
            );

            let intent = flow
                .deposit(
                    amount,
                    |_| tracing::info!("deposit confirmed"),
                    || tracing::warn!("deposit not seen in time"),
                )
                .await?;

            match intent {
                Some(intent) => {
                    println!("Memo: {}", intent.memo());
                    println!("Waiting for the deposit (Ctrl+C to stop)...");
                    if let Some(handle) = flow.take_watch() {
                        report(wait_or_interrupt(handle).await?, &config)?;
                    }
                }
                None => println!("Deposit cancelled"),
            }
        }

        Commands::Watch { memo, amount } => {
            let value = parse_amount(amount, &asset)?;
            let user = user_id()?;
            let provisioner = AddressProvisioner::new(gateway.clone(), open_cache(&config)?);
            let address = provisioner
                .get_or_create_deposit_address(&user, &asset.symbol)
                .await?;

            let intent = DepositIntent::new(memo.clone(), value, address, user, asset.symbol.clone());
            let poller = DepositPoller::new(gateway.clone(), config.poller.clone(), asset.clone());
            let handle = poller.watch(intent, |_| {}, || {});
            println!("Watching for {} (Ctrl+C to stop)...", memo);
            report(wait_or_interrupt(handle).await?, &config)?;
        }

        Commands::ClearCache => {
            let removed = open_cache(&config)?.clear_all().await?;
            println!("Removed {} cached address(es)", removed);
        }
    }

    Ok(())
}

fn open_cache(config: &AppConfig) -> common::Result<Arc<dyn AddressCache>> {
    Ok(Arc::new(SqliteAddressCache::new(&config.cache_path)?))
}

/// Await the watch; Ctrl+C drops (and so cancels) it
async fn wait_or_interrupt(
    handle: market_deposit::WatchHandle,
) -> common::Result<WatchOutcome> {
    tokio::select! {
        outcome = handle.outcome() => Ok(outcome),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            Ok(WatchOutcome::Cancelled)
        }
    }
}

fn report(outcome: WatchOutcome, config: &AppConfig) -> common::Result<()> {
    match outcome {
        WatchOutcome::Confirmed(amount) => {
            println!("Confirmed: {}", format_amount(amount, &config.asset));
            Ok(())
        }
        WatchOutcome::TimedOut => Err(DepositError::PollingTimeout {
            attempts: config.poller.max_attempts,
        }
        .into()),
        WatchOutcome::Cancelled => {
            println!("Stopped");
            Ok(())
        }
    }
}
