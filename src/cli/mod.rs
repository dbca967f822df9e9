use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::{self, AppState};
use crate::application::{LedgerService, Reconciler};
use crate::domain::{format_millis, parse_millis};
use crate::storage::Repository;

/// Bankroll - wager settlement ledger
#[derive(Parser)]
#[command(name = "bankroll")]
#[command(about = "A transactional wager ledger with idempotent ingestion and self-healing reconciliation")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "bankroll.db")]
    pub database: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and provision the account
    Init {
        /// Email identifying the account
        #[arg(long)]
        account: String,

        /// Opening balance (e.g., "1000" or "1000.000")
        #[arg(long, default_value = "0")]
        opening_balance: String,

        /// Source-type labels callers may use (repeatable)
        #[arg(long = "source-type", default_values_t = default_source_types())]
        source_types: Vec<String>,
    },

    /// Serve the ingestion API and run the reconciliation worker
    Serve {
        /// Email of the provisioned account
        #[arg(long)]
        account: String,

        /// Listen address for the HTTP API
        #[arg(long, default_value = "0.0.0.0:8083")]
        listen: String,

        /// Seconds between reconciliation runs
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        reconcile_interval_secs: u64,
    },
}

fn default_source_types() -> Vec<String> {
    vec!["game".to_string(), "server".to_string(), "payment".to_string()]
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        match self.command {
            Commands::Init {
                account,
                opening_balance,
                source_types,
            } => run_init_command(&self.database, &account, &opening_balance, &source_types).await,
            Commands::Serve {
                account,
                listen,
                reconcile_interval_secs,
            } => run_serve_command(&self.database, &account, &listen, reconcile_interval_secs).await,
        }
    }
}

async fn run_init_command(
    database: &str,
    account: &str,
    opening_balance: &str,
    source_types: &[String],
) -> Result<()> {
    let opening_balance = parse_millis(opening_balance)
        .map_err(|err| anyhow::anyhow!("Invalid opening balance: {}", err))?;

    let repo = Repository::init(database).await?;
    let service = LedgerService::new(repo);

    let created = service.provision_account(account, opening_balance).await?;
    service.seed_source_types(source_types).await?;

    println!("Database initialized: {}", database);
    println!(
        "Provisioned account {} (id {}) with balance {}",
        created.email,
        created.id,
        format_millis(created.balance)
    );
    println!("Source types: {}", source_types.join(", "));
    Ok(())
}

async fn run_serve_command(
    database: &str,
    account: &str,
    listen: &str,
    reconcile_interval_secs: u64,
) -> Result<()> {
    let repo = Repository::init(database).await?;

    let account = repo
        .find_account_by_email(account)
        .await?
        .with_context(|| {
            format!("Account {} is not provisioned; run `bankroll init` first", account)
        })?;

    let service = Arc::new(LedgerService::new(repo.clone()));

    let reconciler = Reconciler::new(repo, account.id);
    let period = Duration::from_secs(reconcile_interval_secs);
    tokio::spawn(reconciler.run(period));
    info!(
        account = %account.email,
        account_id = account.id,
        period_secs = reconcile_interval_secs,
        "reconciliation worker started"
    );

    let state = AppState {
        service,
        account_id: account.id,
    };
    let app = api::router(state);

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!(listen, "ingestion API listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "bankroll=debug"
    } else {
        "bankroll=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
