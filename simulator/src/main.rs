//! BankLedger Simulator
//!
//! Runs scripted scenarios or a concurrent transfer stress test against a
//! real store and checks the ledger invariants afterwards.

use clap::Parser;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bankledger_service::{BankService, ServiceConfig};

mod bank;
mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::Scenario;

/// BankLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "BankLedger scenario runner and stress harness")]
struct Args {
    /// Scenario to run: transfer-basic, check-lifecycle, overdraft-rejection,
    /// or a path to a JSON scenario file. Without it a stress run starts.
    #[arg(short, long)]
    scenario: Option<String>,

    /// SQLite database URL; falls back to BANKLEDGER_DATABASE_URL, then
    /// a private in-memory database
    #[arg(long)]
    database_url: Option<String>,

    /// Number of accounts to seed for the stress run
    #[arg(short, long, default_value = "4")]
    accounts: usize,

    /// Opening balance of every seeded account
    #[arg(long, default_value = "1000")]
    initial_balance: Decimal,

    /// Concurrent workers issuing transfers
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Transfers issued by each worker
    #[arg(short, long, default_value = "100")]
    transfers: usize,

    /// Largest single transfer amount
    #[arg(long, default_value = "250")]
    max_transfer: Decimal,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Let withdrawals overdraw accounts
    #[arg(long)]
    allow_overdraft: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::from_env();
    config.storage.database_url = args
        .database_url
        .clone()
        .or_else(|| std::env::var("BANKLEDGER_DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite::memory:".to_string());
    config.ledger.allow_overdraft = args.allow_overdraft;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(database_url = %config.storage.database_url, "Starting BankLedger Simulator");

    let scenario = args.scenario.as_deref().map(Scenario::load).transpose()?;

    let service = BankService::open(config).await?;
    let mut controller = SimulationController::new(service.clone(), args.seed);

    let outcome = match scenario {
        Some(scenario) => controller.run_scenario(scenario).await,
        None => {
            info!(seed = controller.seed(), "No scenario given, running stress test");
            async {
                controller
                    .initialize(args.accounts, args.initial_balance)
                    .await?;
                controller
                    .run_stress(args.workers, args.transfers, args.max_transfer)
                    .await?;
                controller.verify().await
            }
            .await
        }
    };

    let metrics = controller.metrics().await;
    let service_metrics = service.metrics().snapshot();
    service.close().await;

    info!("Simulation complete");
    info!("Total operations: {}", metrics.total_operations);
    info!("Successful: {}", metrics.successful_operations);
    info!("Rejected: {}", metrics.rejected_operations);
    info!("Failed: {}", metrics.failed_operations);
    info!("Success rate: {:.1}%", metrics.success_rate() * 100.0);
    info!(
        "Latency: avg {}µs, p50 {}µs, p99 {}µs",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );
    info!(
        transfers_committed = service_metrics.transfers_committed,
        checks_validated = service_metrics.checks_validated,
        "Service counters"
    );

    outcome
}
