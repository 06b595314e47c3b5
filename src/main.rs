use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::{interval, Duration, MissedTickBehavior};

use rebuybot::execution::{
    JsonlTradeLog, MemoryTradeLog, PaperExchange, SyntheticMarketData, TradeLog,
};
use rebuybot::{EngineConfig, MultiSymbolOrchestrator};

const STATUS_INTERVAL_SECS: u64 = 60;

#[derive(Parser)]
#[command(name = "rebuybot", version, about = "Multi-symbol crash-failsafe rebuy engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trade every configured symbol on paper execution
    Run {
        /// TOML config file (env overrides use the REBUYBOT__ prefix)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Append executed trades to this JSONL file
        #[arg(long)]
        trade_log: Option<PathBuf>,

        /// Seed for the synthetic paper feeds
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Starting price of the synthetic paper feeds
        #[arg(long, default_value_t = 100.0)]
        start_price: f64,

        /// Per-bar volatility of the synthetic paper feeds
        #[arg(long, default_value_t = 0.01)]
        volatility: f64,
    },
    /// Validate the configuration and print the resolved per-symbol params
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            trade_log,
            seed,
            start_price,
            volatility,
        } => {
            let config = load_config(config)?;
            run(config, trade_log, seed, start_price, volatility).await
        }
        Command::CheckConfig { config } => {
            let config = load_config(config)?;
            check_config(&config)
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rebuybot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    EngineConfig::load(path.as_deref()).with_context(|| match &path {
        Some(p) => format!("Failed to load config from {}", p.display()),
        None => "Failed to load config from environment".to_string(),
    })
}

fn check_config(config: &EngineConfig) -> Result<()> {
    println!("✅ Configuration valid");
    println!("  Initial equity:   ${:.2} per symbol", config.initial_equity);
    println!("  Timeframe:        {}m", config.timeframe_minutes);
    println!("  Rebuy cap:        ${:.2}", config.rebuy_max_usd);
    println!("  Stagger:          {}ms", config.stagger_ms);

    for (symbol, params) in config.resolved_params() {
        let json = serde_json::to_string_pretty(&params)
            .with_context(|| format!("Failed to serialize params for {}", symbol))?;
        println!("\n[{}]\n{}", symbol, json);
    }

    Ok(())
}

async fn run(
    config: EngineConfig,
    trade_log_path: Option<PathBuf>,
    seed: u64,
    start_price: f64,
    volatility: f64,
) -> Result<()> {
    tracing::info!("🚀 rebuybot starting on paper execution");

    let trade_log: Arc<dyn TradeLog> = match &trade_log_path {
        Some(path) => Arc::new(
            JsonlTradeLog::open(path)
                .with_context(|| format!("Failed to open trade log {}", path.display()))?,
        ),
        None => Arc::new(MemoryTradeLog::new()),
    };

    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Equity per symbol: ${:.2}", config.initial_equity);
    tracing::info!("  Timeframe: {}m", config.timeframe_minutes);
    tracing::info!("  Rebuy cap: ${:.2}", config.rebuy_max_usd);
    for (symbol, params) in config.resolved_params() {
        tracing::info!("    - {} ({} rebuy)", symbol, params.rebuy_mode);
    }

    let mut orchestrator = MultiSymbolOrchestrator::new(
        config,
        Arc::new(PaperExchange::new()),
        Arc::new(SyntheticMarketData::new(seed, start_price, volatility)),
        trade_log,
    )
    .context("Failed to build orchestrator")?;

    orchestrator.start();
    tracing::info!("\nPress Ctrl+C to stop...\n");

    let mut status_tick = interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    status_tick.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
                break;
            }
            _ = status_tick.tick() => {
                log_status(&orchestrator);
                if !orchestrator.is_running() {
                    tracing::warn!("All workers have exited");
                    break;
                }
            }
        }
    }

    orchestrator.stop().await;
    log_status(&orchestrator);

    tracing::info!("👋 rebuybot stopped");
    Ok(())
}

fn log_status(orchestrator: &MultiSymbolOrchestrator) {
    for status in orchestrator.get_status() {
        tracing::info!(
            "  {} | running={} holding={} qty={:.6} armed={} equity=${:.2} trades={}{}",
            status.symbol,
            status.running,
            status.holding,
            status.position_qty,
            status.rebuy_armed,
            status.equity,
            status.total_trades,
            status
                .last_error
                .as_deref()
                .map(|e| format!(" last_error=\"{}\"", e))
                .unwrap_or_default()
        );
    }

    for opportunity in orchestrator.get_rebuy_opportunities() {
        tracing::info!(
            "  🔁 {} armed @ ${:.4} ({}) ready_at={:?} ready={}",
            opportunity.symbol,
            opportunity.price,
            opportunity.mode,
            opportunity.ready_at,
            opportunity.ready
        );
    }
}
