use crate::backtest::metrics::BacktestMetrics;
use crate::config::TradingParams;
use crate::error::EngineError;
use crate::models::{Candle, Trade};
use crate::trader::{PositionState, SymbolTrader};
use crate::Result;

/// Outcome of one replay
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub symbol: String,
    pub trades: Vec<Trade>,
    pub final_state: PositionState,
    pub metrics: BacktestMetrics,
}

/// Replays candles through the live decision path with immediate fills
pub struct BacktestRunner {
    initial_equity: f64,
}

impl BacktestRunner {
    pub fn new(initial_equity: f64) -> Self {
        Self { initial_equity }
    }

    /// Run one symbol over `candles`
    ///
    /// Any position still open after the last candle is closed at its close
    /// and booked as a normal exit.
    pub fn run(&self, symbol: &str, params: TradingParams, candles: Vec<Candle>) -> Result<BacktestReport> {
        let samples_needed = params.window_len() + 1;
        if candles.len() < samples_needed {
            return Err(EngineError::MarketData {
                symbol: symbol.to_string(),
                reason: format!(
                    "not enough candles for backtest, need {}, got {}",
                    samples_needed,
                    candles.len()
                ),
            });
        }

        tracing::info!(
            symbol = %symbol,
            "Starting backtest: {} candles, mode {}",
            candles.len(),
            params.rebuy_mode
        );

        let mut trader = SymbolTrader::new(symbol, params, self.initial_equity)?;
        let mut trades = Vec::new();

        for candle in candles {
            if let Some(trade) = trader.step_simulated(candle) {
                trades.push(trade);
            }
        }

        if let Some(trade) = trader.liquidate() {
            tracing::debug!(symbol = %symbol, "Closed open position at end of data");
            trades.push(trade);
        }

        let final_state = trader.state().clone();
        let metrics = BacktestMetrics::from_trades(&trades, self.initial_equity, final_state.equity);

        tracing::info!(
            symbol = %symbol,
            "Backtest done: {} trades, net ${:.2} ({:+.2}%), {} crash exits",
            trades.len(),
            metrics.net_pnl,
            metrics.total_return_pct,
            metrics.crash_exits
        );

        Ok(BacktestReport {
            symbol: symbol.to_string(),
            trades,
            final_state,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{MarketScenario, SyntheticDataGenerator};

    #[test]
    fn test_not_enough_candles() {
        let mut gen = SyntheticDataGenerator::new(1);
        let candles = gen.generate(MarketScenario::Sideways, 10, 5);

        let result = BacktestRunner::new(10_000.0).run("TEST", TradingParams::default(), candles);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_ends_flat() {
        for scenario in MarketScenario::all() {
            let mut gen = SyntheticDataGenerator::new(42);
            let candles = gen.generate(scenario, 600, 5);

            let report = BacktestRunner::new(10_000.0)
                .run("TEST", TradingParams::default(), candles)
                .unwrap();

            assert!(!report.final_state.is_holding(), "{:?} left a position open", scenario);
            assert_eq!(report.metrics.final_equity, report.final_state.equity);
            assert_eq!(
                report.final_state.counters.total_trades as usize,
                report.metrics.baseline_entries
                    + report.metrics.confirmation_rebuys
                    + report.metrics.knife_rebuys
            );
        }
    }

    #[test]
    fn test_equity_only_moves_on_sells() {
        let mut gen = SyntheticDataGenerator::new(11);
        let candles = gen.generate(MarketScenario::Volatile, 500, 5);

        let report = BacktestRunner::new(10_000.0)
            .run("TEST", TradingParams::default(), candles)
            .unwrap();

        let mut equity = 10_000.0;
        for trade in &report.trades {
            if trade.trade_type.side() == crate::models::TradeSide::Buy {
                assert_eq!(trade.equity, equity);
            } else {
                assert!((trade.equity - (equity + trade.pnl)).abs() < 1e-6);
                equity = trade.equity;
            }
        }
    }
}
