// Multi-symbol orchestration: one task per symbol, watch-channel status
pub mod status;
mod worker;

pub use status::{RebuyOpportunity, SymbolStatus, TraderSnapshot};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::execution::{EquitySource, MarketData, OrderExecutor, TradeLog};
use crate::trader::SymbolTrader;
use crate::Result;

use worker::{SymbolWorker, WorkerContext};

struct WorkerHandle {
    symbol: String,
    /// Taken when the worker is spawned
    trader: Option<SymbolTrader>,
    status_tx: watch::Sender<TraderSnapshot>,
    status_rx: watch::Receiver<TraderSnapshot>,
    trading_tx: watch::Sender<bool>,
    /// Supervisor task; finishes when the worker does, however it ends
    join: Option<JoinHandle<()>>,
    worker: Option<AbortHandle>,
}

/// Runs one isolated [`SymbolTrader`] per configured symbol
///
/// Traders share configuration constants (including the rebuy USD ceiling)
/// and nothing else. Status reads never block a worker.
pub struct MultiSymbolOrchestrator {
    config: EngineConfig,
    ctx: WorkerContext,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<WorkerHandle>,
}

impl MultiSymbolOrchestrator {
    /// Validate the config and build every trader up front
    pub fn new(
        config: EngineConfig,
        executor: Arc<dyn OrderExecutor>,
        market_data: Arc<dyn MarketData>,
        trade_log: Arc<dyn TradeLog>,
    ) -> Result<Self> {
        config.validate()?;

        let mut workers = Vec::with_capacity(config.symbols.len());
        for (symbol, params) in config.resolved_params() {
            let trader = SymbolTrader::new(symbol.clone(), params, config.initial_equity)?;
            let (status_tx, status_rx) = watch::channel(trader.snapshot(false));
            let (trading_tx, _) = watch::channel(trader.trading_enabled());

            workers.push(WorkerHandle {
                symbol,
                trader: Some(trader),
                status_tx,
                status_rx,
                trading_tx,
                join: None,
                worker: None,
            });
        }

        let (shutdown_tx, _) = watch::channel(false);

        let ctx = WorkerContext {
            executor,
            market_data,
            trade_log,
            equity: None,
            timeframe_minutes: config.timeframe_minutes,
            warmup_bars: config.warmup_bars,
        };

        tracing::info!(
            "Orchestrator ready: {} symbols, rebuy cap ${:.2}",
            workers.len(),
            config.rebuy_max_usd
        );

        Ok(Self {
            config,
            ctx,
            shutdown_tx,
            workers,
        })
    }

    /// Size from an external equity snapshot instead of each trader's ledger
    pub fn with_equity_source(mut self, source: Arc<dyn EquitySource>) -> Self {
        self.ctx.equity = Some(source);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn symbols(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.symbol.clone()).collect()
    }

    /// Spawn one task per symbol, the i-th delayed by `i * stagger_ms`
    ///
    /// Must be called inside a tokio runtime. A second call is a no-op.
    pub fn start(&mut self) {
        let stagger = Duration::from_millis(self.config.stagger_ms);
        let mut spawned = 0;

        for (index, handle) in self.workers.iter_mut().enumerate() {
            let Some(trader) = handle.trader.take() else {
                continue;
            };

            let worker = SymbolWorker {
                trader,
                ctx: self.ctx.clone(),
                start_delay: stagger * index as u32,
                shutdown: self.shutdown_tx.subscribe(),
                trading: handle.trading_tx.subscribe(),
                status_tx: handle.status_tx.clone(),
                last_error: None,
            };

            let task = tokio::spawn(worker.run());
            handle.worker = Some(task.abort_handle());
            handle.join = Some(tokio::spawn(supervise(
                handle.symbol.clone(),
                task,
                handle.status_tx.clone(),
            )));
            spawned += 1;
        }

        if spawned > 0 {
            tracing::info!("▶️  Started {} symbol workers ({:?} stagger)", spawned, stagger);
        }
    }

    /// Signal every worker, then join each with the configured timeout
    ///
    /// Workers finish the tick they are on (including an in-flight order)
    /// before exiting. A worker that overruns the timeout is aborted.
    pub async fn stop(&mut self) {
        self.shutdown_tx.send_replace(true);
        let timeout = Duration::from_secs(self.config.stop_timeout_secs);

        for handle in &mut self.workers {
            let Some(mut join) = handle.join.take() else {
                continue;
            };

            match tokio::time::timeout(timeout, &mut join).await {
                Ok(Ok(())) => {
                    handle.worker = None;
                }
                Ok(Err(e)) => {
                    tracing::error!(symbol = %handle.symbol, "Supervisor task failed: {}", e);
                    mark_stopped(&handle.status_tx);
                }
                Err(_) => {
                    tracing::warn!(
                        symbol = %handle.symbol,
                        "Worker did not stop within {:?}, aborting",
                        timeout
                    );
                    if let Some(worker) = handle.worker.take() {
                        worker.abort();
                    }
                    join.abort();
                    mark_stopped(&handle.status_tx);
                }
            }
        }

        tracing::info!("⏹️  All symbol workers stopped");
    }

    /// True while any worker task is alive
    pub fn is_running(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.join.as_ref().is_some_and(|j| !j.is_finished()))
    }

    /// Latest snapshot per symbol, in configuration order
    pub fn get_status(&self) -> Vec<SymbolStatus> {
        self.snapshots().iter().map(SymbolStatus::from).collect()
    }

    /// Full snapshots (position, counters, last error) per symbol
    pub fn snapshots(&self) -> Vec<TraderSnapshot> {
        self.workers
            .iter()
            .map(|w| {
                let mut snapshot = w.status_rx.borrow().clone();
                snapshot.trading_enabled = *w.trading_tx.borrow();
                snapshot
            })
            .collect()
    }

    /// Symbols currently armed for a rebuy
    pub fn get_rebuy_opportunities(&self) -> Vec<RebuyOpportunity> {
        let now = Utc::now();
        self.workers
            .iter()
            .filter_map(|w| RebuyOpportunity::from_snapshot(&w.status_rx.borrow(), now))
            .collect()
    }

    /// Pause or resume new entries for one symbol; exits are still managed
    ///
    /// Takes effect on the symbol's next candle.
    pub fn set_trading_enabled(&self, symbol: &str, enabled: bool) -> Result<()> {
        let handle = self.handle(symbol)?;
        handle.trading_tx.send_replace(enabled);
        tracing::info!(symbol = %symbol, "Trading {} requested", if enabled { "resume" } else { "pause" });
        Ok(())
    }

    /// Watch one symbol's snapshots as they are published
    pub fn subscribe(&self, symbol: &str) -> Result<watch::Receiver<TraderSnapshot>> {
        Ok(self.handle(symbol)?.status_rx.clone())
    }

    fn handle(&self, symbol: &str) -> Result<&WorkerHandle> {
        self.workers
            .iter()
            .find(|w| w.symbol == symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }
}

fn mark_stopped(status_tx: &watch::Sender<TraderSnapshot>) {
    status_tx.send_modify(|snapshot| snapshot.running = false);
}

/// Await one worker; a panic or abort still publishes `running = false`
async fn supervise(
    symbol: String,
    task: JoinHandle<()>,
    status_tx: watch::Sender<TraderSnapshot>,
) {
    match task.await {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            tracing::error!(symbol = %symbol, "💀 Worker panicked: {}", e);
            status_tx.send_modify(|snapshot| {
                snapshot.running = false;
                snapshot.last_error = Some(format!("worker panicked: {}", e));
            });
        }
        Err(_) => mark_stopped(&status_tx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolConfig;
    use crate::execution::{MemoryTradeLog, PaperExchange, ReplayMarketData};

    fn config(symbols: &[&str]) -> EngineConfig {
        EngineConfig {
            stagger_ms: 0,
            stop_timeout_secs: 1,
            symbols: symbols
                .iter()
                .map(|s| SymbolConfig {
                    symbol: s.to_string(),
                    params: None,
                })
                .collect(),
            ..EngineConfig::default()
        }
    }

    fn orchestrator(symbols: &[&str]) -> MultiSymbolOrchestrator {
        MultiSymbolOrchestrator::new(
            config(symbols),
            Arc::new(PaperExchange::new()),
            Arc::new(ReplayMarketData::new()),
            Arc::new(MemoryTradeLog::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_status_before_start() {
        let orch = orchestrator(&["BTC/USDT", "ETH/USDT"]);
        let status = orch.get_status();

        assert_eq!(status.len(), 2);
        assert_eq!(status[0].symbol, "BTC/USDT");
        assert!(status.iter().all(|s| !s.running && !s.holding && !s.rebuy_armed));
        assert!(orch.get_rebuy_opportunities().is_empty());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let result = MultiSymbolOrchestrator::new(
            config(&[]),
            Arc::new(PaperExchange::new()),
            Arc::new(ReplayMarketData::new()),
            Arc::new(MemoryTradeLog::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_symbol_rejected() {
        let orch = orchestrator(&["BTC/USDT"]);
        assert!(matches!(
            orch.set_trading_enabled("DOGE/USDT", false),
            Err(EngineError::UnknownSymbol(_))
        ));
        assert!(orch.set_trading_enabled("BTC/USDT", false).is_ok());
        assert!(!orch.get_status()[0].trading_enabled);
    }

    #[tokio::test]
    async fn test_missing_feed_stops_only_that_worker() {
        // No replay series registered: every subscription fails
        let mut orch = orchestrator(&["BTC/USDT"]);
        orch.start();
        orch.stop().await;

        let status = orch.get_status();
        assert!(!status[0].running);
        assert!(status[0].last_error.is_some());
        assert!(!orch.is_running());
    }
}
