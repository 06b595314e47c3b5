use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::TradingParams;
use crate::indicators::IndicatorSnapshot;
use crate::models::{Candle, Fill, OrderIntent, Trade, TradeType};
use crate::risk::{CrashCheck, CrashFailsafe, PositionSize, RiskSizer};
use crate::strategy::{entry_signal, exit_signal, ExitSignal, RebuyPriceCalculator};

use super::state::PositionState;

/// Leftover quantity below this fraction of the position counts as fully sold
const DUST_FRACTION: f64 = 1e-9;

/// Why an order was planned
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Entry {
        size: PositionSize,
    },
    NormalExit {
        signal: ExitSignal,
    },
    CrashExit {
        check: CrashCheck,
        /// `None` when the window yields no usable trigger; the exit then
        /// leaves the symbol unarmed
        rebuy_price: Option<f64>,
        rebuy_ready_at: DateTime<Utc>,
    },
}

/// A planned transition: the order to place and what to do once it fills
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub intent: OrderIntent,
    pub kind: ActionKind,
    /// Close time of the candle that produced this action
    pub at: DateTime<Utc>,
}

/// Result of one pass through the cascade
///
/// `state` carries the tick's observational updates (peak tracking, dynamic
/// rebuy price) and is safe to keep whether or not the order fills.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: PositionState,
    pub action: Option<Action>,
}

/// Per-symbol decision cascade. No I/O: same inputs, same decision.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    symbol: String,
    params: TradingParams,
    failsafe: CrashFailsafe,
    sizer: RiskSizer,
    rebuy: RebuyPriceCalculator,
}

impl DecisionEngine {
    pub fn new(symbol: impl Into<String>, params: TradingParams) -> Self {
        Self {
            symbol: symbol.into(),
            failsafe: CrashFailsafe::from_params(&params),
            sizer: RiskSizer::from_params(&params),
            rebuy: RebuyPriceCalculator::new(
                params.rebuy_mode,
                params.rebuy_lookback,
                params.rebuy_dynamic,
            ),
            params,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn params(&self) -> &TradingParams {
        &self.params
    }

    pub fn sizer(&self) -> &RiskSizer {
        &self.sizer
    }

    /// Evaluate one closed candle (the last in `window`)
    ///
    /// Priority: crash exit, then normal exit, then rebuy or baseline entry.
    /// At most one action per tick.
    pub fn decide(
        &self,
        state: &PositionState,
        window: &[Candle],
        indicators: &IndicatorSnapshot,
        equity: f64,
        trading_enabled: bool,
    ) -> Decision {
        let mut next = state.clone();

        let Some(candle) = window.last() else {
            return Decision { state: next, action: None };
        };

        if next.is_holding() {
            next.peak_since_entry = next.peak_since_entry.max(candle.high);
            let action = self.check_exits(&next, window, candle, indicators);
            return Decision { state: next, action };
        }

        if !trading_enabled {
            return Decision { state: next, action: None };
        }

        let entry_type = if next.rebuy_armed {
            // Trigger comes from the bars before this one; this close is tested against it
            let history = &window[..window.len() - 1];
            next.rebuy_price = self.rebuy.refresh(next.rebuy_price, history);

            let ready = next
                .rebuy_ready_at
                .map_or(true, |ready_at| candle.timestamp >= ready_at);

            if !ready {
                tracing::debug!(
                    symbol = %self.symbol,
                    "Rebuy armed @ ${:.4}, cooling down until {:?}",
                    next.rebuy_price,
                    next.rebuy_ready_at
                );
                return Decision { state: next, action: None };
            }

            let mode = self.rebuy.mode();
            if !mode.should_fire(candle.close, next.rebuy_price) {
                return Decision { state: next, action: None };
            }
            mode.entry_type()
        } else if entry_signal(candle.close, indicators.bands.as_ref()) {
            TradeType::BaselineEntry
        } else {
            return Decision { state: next, action: None };
        };

        let action = self.plan_entry(entry_type, candle, equity);
        Decision { state: next, action }
    }

    fn check_exits(
        &self,
        state: &PositionState,
        window: &[Candle],
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> Option<Action> {
        let check = self.failsafe.evaluate(
            state.entry_price,
            state.peak_since_entry,
            candle.close,
            candle.low,
            indicators.atr,
        );

        tracing::debug!(
            symbol = %self.symbol,
            "Crash check: peak ${:.4}, drop {:.4} ({:.2}%), atr threshold {:?}, in_profit={}",
            state.peak_since_entry,
            check.drop,
            check.drop_pct * 100.0,
            check.atr_threshold,
            check.in_profit
        );

        if check.fires() {
            let rebuy_price = self.rebuy.arm_price(window).filter(|p| p.is_finite() && *p > 0.0);
            if rebuy_price.is_none() {
                tracing::warn!(
                    symbol = %self.symbol,
                    "No usable {} rebuy price at crash exit, symbol will not be armed",
                    self.rebuy.mode()
                );
            }
            let rebuy_ready_at =
                candle.timestamp + Duration::minutes(self.params.rebuy_cooldown_minutes);

            return Some(Action {
                intent: self.intent(TradeType::CrashExit, state.position_qty, candle.close),
                kind: ActionKind::CrashExit {
                    check,
                    rebuy_price,
                    rebuy_ready_at,
                },
                at: candle.timestamp,
            });
        }

        exit_signal(
            candle,
            state.entry_price,
            indicators.bands.as_ref(),
            self.params.take_profit_pct,
            self.params.stop_loss_pct,
        )
        .map(|signal| Action {
            intent: self.intent(TradeType::NormalExit, state.position_qty, candle.close),
            kind: ActionKind::NormalExit { signal },
            at: candle.timestamp,
        })
    }

    /// Unconditional exit at `close`, used to flatten at the end of a replay
    pub fn liquidate(&self, state: &PositionState, close: f64, at: DateTime<Utc>) -> Option<Action> {
        if !state.is_holding() || close <= 0.0 {
            return None;
        }

        Some(Action {
            intent: self.intent(TradeType::NormalExit, state.position_qty, close),
            kind: ActionKind::NormalExit {
                signal: ExitSignal::EndOfData,
            },
            at,
        })
    }

    fn plan_entry(&self, entry_type: TradeType, candle: &Candle, equity: f64) -> Option<Action> {
        let fill_price = self.sizer.buy_fill(candle.close);
        let size = self.sizer.size(equity, fill_price, entry_type);

        if size.quantity <= 0.0 || !size.quantity.is_finite() {
            tracing::warn!(
                symbol = %self.symbol,
                "{:?} signal but sized to zero (equity ${:.2})",
                entry_type,
                equity
            );
            return None;
        }

        Some(Action {
            intent: OrderIntent {
                symbol: self.symbol.clone(),
                side: entry_type.side(),
                quantity: size.quantity,
                price: fill_price,
                trade_type: entry_type,
            },
            kind: ActionKind::Entry { size },
            at: candle.timestamp,
        })
    }

    fn intent(&self, trade_type: TradeType, quantity: f64, close: f64) -> OrderIntent {
        OrderIntent {
            symbol: self.symbol.clone(),
            side: trade_type.side(),
            quantity,
            price: self.sizer.sell_fill(close),
            trade_type,
        }
    }

    /// Apply a confirmed fill. Only called after the executor succeeded.
    pub fn commit(&self, state: &PositionState, action: &Action, fill: &Fill) -> (PositionState, Trade) {
        let mut next = state.clone();
        let trade_type = action.intent.trade_type;

        let (quantity, pnl, fees, capped) = match &action.kind {
            ActionKind::Entry { size } => {
                next.position_qty = fill.quantity;
                next.entry_price = fill.price;
                next.peak_since_entry = fill.price;
                next.entry_type = Some(trade_type);
                next.entry_time = Some(action.at);
                next.counters.total_trades += 1;

                if trade_type.is_rebuy() {
                    next.disarm();
                    next.counters.rebuy_trades += 1;
                    if size.capped {
                        next.counters.capped_rebuys += 1;
                    }
                }
                (fill.quantity, 0.0, 0.0, size.capped)
            }
            ActionKind::NormalExit { .. } | ActionKind::CrashExit { .. } => {
                let sold = fill.quantity.min(state.position_qty);
                let realized = self
                    .sizer
                    .realized_pnl(state.entry_price, fill.price, sold);
                next.equity += realized.net;

                let remaining = state.position_qty - sold;
                if remaining > state.position_qty * DUST_FRACTION {
                    // Partial fill: keep holding the rest, the next tick re-evaluates exits
                    next.position_qty = remaining;
                } else {
                    next.clear_position();

                    match &action.kind {
                        ActionKind::CrashExit {
                            rebuy_price: Some(rebuy_price),
                            rebuy_ready_at,
                            ..
                        } => {
                            next.rebuy_armed = true;
                            next.rebuy_price = *rebuy_price;
                            next.rebuy_ready_at = Some(*rebuy_ready_at);
                            next.counters.crash_exits += 1;
                        }
                        ActionKind::CrashExit { .. } => next.counters.crash_exits += 1,
                        _ => next.counters.normal_exits += 1,
                    }
                }
                (sold, realized.net, realized.fees, false)
            }
        };

        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            time: action.at,
            trade_type,
            side: action.intent.side,
            price: fill.price,
            quantity,
            pnl,
            fees,
            equity: next.equity,
            capped,
        };

        (next, trade)
    }
}
