use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use trade_sentinel_broker_sim::SimBroker;
use trade_sentinel_core::{AppConfig, BrokerGateway, ConfigLoader};
use trade_sentinel_data::{
    Database, LevelRepository, NotificationRepository, SignalRepository, TradeRepository,
};
use trade_sentinel_engine::{LevelExecutor, LevelMonitor, PnlReconciler, TradeLifecycle};
use trade_sentinel_scheduler::{ProcessConfig, ProcessScheduler};

#[derive(Parser)]
#[command(name = "trade-sentinel")]
#[command(about = "Post-fill trade management engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine with all scheduled processes
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run one P&L reconciliation pass and exit
    Reconcile {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Reconcile { config } => reconcile_once(&config).await,
    }
}

async fn run(config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    let broker = build_broker(&config)?;

    tracing::info!(mode = %config.broker.mode, "Engine starting");

    let trades = TradeRepository::new(db.pool().clone());
    let levels = LevelRepository::new(db.pool().clone());
    let notifications = NotificationRepository::new(db.pool().clone());
    let signals = SignalRepository::new(db.pool().clone());

    let lifecycle = Arc::new(TradeLifecycle::new(
        trades.clone(),
        levels.clone(),
        notifications,
        signals,
        Arc::clone(&broker),
    ));
    let executor = LevelExecutor::new(db.pool().clone(), Arc::clone(&broker));
    let monitor = Arc::new(LevelMonitor::new(levels, Arc::clone(&broker), executor));
    let reconciler = Arc::new(PnlReconciler::new(trades, Arc::clone(&broker)));

    let p = &config.processes;
    let timeout = Duration::from_secs(p.task_timeout_secs);
    let mut scheduler = ProcessScheduler::new();

    let task_lifecycle = Arc::clone(&lifecycle);
    scheduler.register(
        ProcessConfig::new("trade_sync", Duration::from_secs(p.trade_sync_interval_secs))
            .with_api_budget(1, p.trade_sync_api_budget)
            .with_timeout(timeout),
        move || {
            let lifecycle = Arc::clone(&task_lifecycle);
            async move { lifecycle.sync_pending_trades().await }
        },
    );

    let task_monitor = Arc::clone(&monitor);
    scheduler.register(
        ProcessConfig::new("level_monitor", Duration::from_secs(p.level_monitor_interval_secs))
            .with_api_budget(1, p.level_monitor_api_budget)
            .with_timeout(timeout),
        move || {
            let monitor = Arc::clone(&task_monitor);
            async move { monitor.tick().await }
        },
    );

    let task_lifecycle = Arc::clone(&lifecycle);
    scheduler.register(
        ProcessConfig::new("price_update", Duration::from_secs(p.price_update_interval_secs))
            .with_api_budget(1, p.price_update_api_budget)
            .with_timeout(timeout),
        move || {
            let lifecycle = Arc::clone(&task_lifecycle);
            async move { lifecycle.refresh_position_prices().await }
        },
    );

    let task_reconciler = Arc::clone(&reconciler);
    scheduler.register(
        ProcessConfig::new("pnl_reconcile", Duration::from_secs(p.reconcile_interval_secs))
            .with_api_budget(1, p.reconcile_api_budget)
            .with_timeout(timeout),
        move || {
            let reconciler = Arc::clone(&task_reconciler);
            async move { reconciler.reconcile().await }
        },
    );

    scheduler.start_all();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    scheduler.shutdown().await;

    for status in scheduler.status().await {
        tracing::info!(
            process = %status.name,
            runs = status.metrics.total_runs,
            failures = status.metrics.total_failures,
            skipped = status.metrics.skipped_budget_cycles,
            "Final process stats"
        );
    }

    Ok(())
}

async fn reconcile_once(config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    let broker = build_broker(&config)?;

    let trades = TradeRepository::new(db.pool().clone());
    let reconciler = PnlReconciler::new(trades, broker);

    match reconciler.recompute().await? {
        Some(report) => {
            println!("Total realized P&L: {}", report.total_pnl);
            println!(
                "Win rate: {:.1}% ({} winning / {} losing matches)",
                report.win_rate, report.winning_matches, report.losing_matches
            );
            let mut symbols: Vec<_> = report.per_symbol_pnl.iter().collect();
            symbols.sort_by(|a, b| a.0.cmp(b.0));
            for (symbol, pnl) in symbols {
                println!("  {symbol}: {pnl}");
            }
        }
        None => bail!("Broker fill history unavailable"),
    }

    Ok(())
}

fn build_broker(config: &AppConfig) -> Result<Arc<dyn BrokerGateway>> {
    match config.broker.mode.as_str() {
        "paper" => Ok(Arc::new(SimBroker::new())),
        other => bail!("Unsupported broker mode: {other}"),
    }
}
