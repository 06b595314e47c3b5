use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::execution::market_data::BAR_SETTLE;
use crate::execution::{next_bar_boundary, EquitySource, MarketData, OrderExecutor, TradeLog};
use crate::models::{Candle, Trade};
use crate::trader::SymbolTrader;

use super::status::TraderSnapshot;

/// Collaborators shared by every worker
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub executor: Arc<dyn OrderExecutor>,
    pub market_data: Arc<dyn MarketData>,
    pub trade_log: Arc<dyn TradeLog>,
    pub equity: Option<Arc<dyn EquitySource>>,
    pub timeframe_minutes: u32,
    pub warmup_bars: usize,
}

/// One symbol's event loop. Owns its trader; talks to the outside only
/// through watch channels.
pub(crate) struct SymbolWorker {
    pub trader: SymbolTrader,
    pub ctx: WorkerContext,
    pub start_delay: Duration,
    pub shutdown: watch::Receiver<bool>,
    pub trading: watch::Receiver<bool>,
    pub status_tx: watch::Sender<TraderSnapshot>,
    pub last_error: Option<String>,
}

impl SymbolWorker {
    pub async fn run(mut self) {
        let symbol = self.trader.symbol().to_string();

        if !self.start_delay.is_zero() {
            tracing::debug!(symbol = %symbol, "Staggered start in {:?}", self.start_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.start_delay) => {}
                _ = self.shutdown.changed() => {
                    self.publish(false);
                    return;
                }
            }
        }

        let mut feed = match self
            .ctx
            .market_data
            .subscribe(&symbol, self.ctx.timeframe_minutes)
        {
            Ok(feed) => feed,
            Err(e) => {
                tracing::error!(symbol = %symbol, "❌ Market data subscription failed: {}", e);
                self.last_error = Some(e.to_string());
                self.publish(false);
                return;
            }
        };

        match feed.warmup(self.ctx.warmup_bars).await {
            Ok(history) => {
                self.trader.warmup(history);
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, "Warmup failed, starting cold: {}", e);
                self.last_error = Some(e.to_string());
            }
        }

        tracing::info!(symbol = %symbol, "🚀 Worker started");
        self.publish(true);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Only the wait is cancellable; a tick in progress runs to completion
            let next = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                next = feed.next_closed_candle() => next,
            };

            match next {
                Ok(Some(candle)) => self.on_candle(candle).await,
                Ok(None) => {
                    tracing::info!(symbol = %symbol, "Feed ended");
                    break;
                }
                Err(e) => {
                    let retry_in = self.until_next_bar();
                    tracing::warn!(
                        symbol = %symbol,
                        "⚠️  Market data error, skipping bar (retry in {:?}): {}",
                        retry_in,
                        e
                    );
                    self.last_error = Some(e.to_string());
                    self.publish(true);

                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => break,
                        _ = tokio::time::sleep(retry_in) => {}
                    }
                }
            }
        }

        self.publish(false);
        tracing::info!(symbol = %symbol, "🛑 Worker stopped");
    }

    async fn on_candle(&mut self, candle: Candle) {
        self.trader
            .set_trading_enabled(*self.trading.borrow_and_update());

        let equity = self.read_equity().await;

        match self
            .trader
            .step(candle, self.ctx.executor.as_ref(), equity)
            .await
        {
            Ok(Some(trade)) => {
                self.last_error = None;
                self.record(trade).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    symbol = %self.trader.symbol(),
                    "⚠️  Order failed, position unchanged: {}",
                    e
                );
                self.last_error = Some(e.to_string());
            }
        }

        self.publish(true);
    }

    /// Trade logs may do file I/O; keep it off the runtime threads
    async fn record(&self, trade: Trade) {
        let log = Arc::clone(&self.ctx.trade_log);
        let (symbol, id) = (trade.symbol.clone(), trade.id);

        match tokio::task::spawn_blocking(move || log.record(&trade)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(symbol = %symbol, "Failed to record trade {}: {}", id, e);
            }
            Err(e) => {
                tracing::error!(symbol = %symbol, "Trade log task for {} failed: {}", id, e);
            }
        }
    }

    /// Wait before polling a failed feed again: the next bar close plus settle time
    fn until_next_bar(&self) -> Duration {
        let now = Utc::now();
        let boundary = next_bar_boundary(now, self.ctx.timeframe_minutes);
        (boundary - now).to_std().unwrap_or(Duration::ZERO) + BAR_SETTLE
    }

    /// External equity snapshot, or `None` to size from the local ledger
    async fn read_equity(&self) -> Option<f64> {
        let source = self.ctx.equity.as_ref()?;

        match source.equity_usd(self.trader.symbol()).await {
            Ok(equity) if equity.is_finite() && equity > 0.0 => Some(equity),
            Ok(equity) => {
                tracing::warn!(
                    symbol = %self.trader.symbol(),
                    "Ignoring equity snapshot ${:.2}, using local ledger",
                    equity
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    symbol = %self.trader.symbol(),
                    "Equity unavailable, using local ledger: {}",
                    e
                );
                None
            }
        }
    }

    fn publish(&self, running: bool) {
        let mut snapshot = self.trader.snapshot(running);
        snapshot.last_error = self.last_error.clone();
        self.status_tx.send_replace(snapshot);
    }
}
