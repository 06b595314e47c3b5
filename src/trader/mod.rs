// Per-symbol position state machine
pub mod decision;
pub mod state;
pub mod window;

pub use decision::{Action, ActionKind, Decision, DecisionEngine};
pub use state::{PositionState, TraderCounters};
pub use window::CandleWindow;

use chrono::{DateTime, Utc};

use crate::config::TradingParams;
use crate::error::EngineError;
use crate::execution::OrderExecutor;
use crate::indicators::compute_indicators;
use crate::models::{Candle, Fill, Trade};
use crate::orchestrator::TraderSnapshot;
use crate::Result;

/// Extra candles kept beyond the longest indicator lookback
const WINDOW_SLACK: usize = 5;

/// Owns one symbol's window and position state. Single writer.
pub struct SymbolTrader {
    engine: DecisionEngine,
    window: CandleWindow,
    state: PositionState,
    trading_enabled: bool,
    last_candle_at: Option<DateTime<Utc>>,
}

impl SymbolTrader {
    /// Start flat with `initial_equity`. Fails fast on invalid params.
    pub fn new(symbol: impl Into<String>, params: TradingParams, initial_equity: f64) -> Result<Self> {
        params.validate()?;
        if !initial_equity.is_finite() || initial_equity <= 0.0 {
            return Err(EngineError::invalid("initial_equity", "must be > 0"));
        }

        let window = CandleWindow::new(params.window_len() + WINDOW_SLACK);
        let trading_enabled = params.trading_enabled;

        Ok(Self {
            engine: DecisionEngine::new(symbol, params),
            window,
            state: PositionState::flat(initial_equity),
            trading_enabled,
            last_candle_at: None,
        })
    }

    pub fn symbol(&self) -> &str {
        self.engine.symbol()
    }

    pub fn params(&self) -> &TradingParams {
        self.engine.params()
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }

    pub fn set_trading_enabled(&mut self, enabled: bool) {
        if enabled != self.trading_enabled {
            tracing::info!(
                symbol = %self.symbol(),
                "Trading {}",
                if enabled { "resumed" } else { "paused" }
            );
        }
        self.trading_enabled = enabled;
    }

    /// Seed the window with history. No decisions are made.
    pub fn warmup(&mut self, candles: Vec<Candle>) -> usize {
        let mut accepted = 0;
        for candle in candles {
            let timestamp = candle.timestamp;
            if self.window.push(candle) {
                self.last_candle_at = Some(timestamp);
                accepted += 1;
            }
        }

        tracing::info!(
            symbol = %self.symbol(),
            "Warmed up with {} candles ({} in window)",
            accepted,
            self.window.len()
        );
        accepted
    }

    /// Run the decision cascade on a newly closed candle
    ///
    /// Observational updates (peak, dynamic rebuy price) are kept; the
    /// returned action has not been applied yet.
    pub fn plan(&mut self, candle: Candle, equity: Option<f64>) -> Option<Action> {
        let timestamp = candle.timestamp;
        if !self.window.push(candle) {
            tracing::warn!(
                symbol = %self.engine.symbol(),
                "Ignoring out-of-order candle at {}",
                timestamp
            );
            return None;
        }
        self.last_candle_at = Some(timestamp);

        let window = self.window.as_slice();
        let indicators = compute_indicators(window, self.engine.params());
        let equity = equity.unwrap_or(self.state.equity);

        let decision = self.engine.decide(
            &self.state,
            window,
            &indicators,
            equity,
            self.trading_enabled,
        );

        self.state = decision.state;
        decision.action
    }

    /// Apply a confirmed fill for an action returned by [`plan`](Self::plan)
    pub fn commit(&mut self, action: &Action, fill: &Fill) -> Trade {
        let (next, trade) = self.engine.commit(&self.state, action, fill);

        if let Err(violation) = next.check_invariants() {
            tracing::error!(symbol = %self.symbol(), "State invariant broken: {}", violation);
        }
        self.state = next;

        let is_exit = !matches!(action.kind, ActionKind::Entry { .. });
        if is_exit && self.state.is_holding() {
            tracing::warn!(
                symbol = %trade.symbol,
                "⚠️  Partial {:?} fill: sold {:.6} of {:.6} @ ${:.4}, {:.6} still held",
                trade.trade_type,
                trade.quantity,
                action.intent.quantity,
                trade.price,
                self.state.position_qty
            );
            return trade;
        }

        match action.kind {
            ActionKind::CrashExit { check, .. } => tracing::warn!(
                symbol = %trade.symbol,
                "💥 CRASH EXIT @ ${:.4} (drop {:.2}% from peak, {:?}) | P&L ${:.2} | rebuy armed={} @ ${:.4} after {:?}",
                trade.price,
                check.drop_pct * 100.0,
                check.trigger,
                trade.pnl,
                self.state.rebuy_armed,
                self.state.rebuy_price,
                self.state.rebuy_ready_at
            ),
            ActionKind::NormalExit { signal } => tracing::info!(
                symbol = %trade.symbol,
                "📤 EXIT ({:?}) @ ${:.4} qty {:.6} | P&L ${:.2} | equity ${:.2}",
                signal,
                trade.price,
                trade.quantity,
                trade.pnl,
                trade.equity
            ),
            ActionKind::Entry { size } => tracing::info!(
                symbol = %trade.symbol,
                "🎯 {:?} @ ${:.4} qty {:.6} (risk/unit ${:.4}{})",
                trade.trade_type,
                trade.price,
                trade.quantity,
                size.risk_per_unit,
                if size.capped { ", capped" } else { "" }
            ),
        }

        trade
    }

    /// One tick against a live executor
    ///
    /// On execution failure the error is returned and the position is left
    /// as it was; the next candle retries naturally.
    pub async fn step(
        &mut self,
        candle: Candle,
        executor: &dyn OrderExecutor,
        equity: Option<f64>,
    ) -> Result<Option<Trade>> {
        let Some(action) = self.plan(candle, equity) else {
            return Ok(None);
        };

        let fill = executor.submit(&action.intent).await?;
        if fill.quantity <= 0.0 || fill.price <= 0.0 {
            return Err(EngineError::Execution {
                symbol: self.symbol().to_string(),
                reason: format!("invalid fill {:?}", fill),
            });
        }

        Ok(Some(self.commit(&action, &fill)))
    }

    /// One tick with an immediate fill at the intended price (backtesting)
    pub fn step_simulated(&mut self, candle: Candle) -> Option<Trade> {
        let action = self.plan(candle, None)?;
        let fill = Fill {
            price: action.intent.price,
            quantity: action.intent.quantity,
            timestamp: action.at,
        };
        Some(self.commit(&action, &fill))
    }

    /// Flatten any open position at the last seen close (simulated fill)
    pub fn liquidate(&mut self) -> Option<Trade> {
        let last = self.window.last()?.clone();
        let action = self.engine.liquidate(&self.state, last.close, last.timestamp)?;
        let fill = Fill {
            price: action.intent.price,
            quantity: action.intent.quantity,
            timestamp: action.at,
        };
        Some(self.commit(&action, &fill))
    }

    /// Read-only copy for status reporting
    pub fn snapshot(&self, running: bool) -> TraderSnapshot {
        TraderSnapshot {
            symbol: self.symbol().to_string(),
            running,
            trading_enabled: self.trading_enabled,
            position_qty: self.state.position_qty,
            entry_price: self.state.entry_price,
            peak_since_entry: self.state.peak_since_entry,
            equity: self.state.equity,
            rebuy_armed: self.state.rebuy_armed,
            rebuy_price: self.state.rebuy_price,
            rebuy_mode: self.params().rebuy_mode,
            rebuy_ready_at: self.state.rebuy_ready_at,
            counters: self.state.counters.clone(),
            last_candle_at: self.last_candle_at,
            last_error: None,
        }
    }
}
