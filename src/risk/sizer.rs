use serde::{Deserialize, Serialize};

use crate::config::TradingParams;
use crate::models::TradeType;

/// Floor on per-unit risk so a tiny stop distance cannot explode the size
pub const RISK_EPSILON: f64 = 1e-9;

/// Sized order quantity plus the numbers that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub quantity: f64,
    pub risk_per_unit: f64,
    pub dollars_at_risk: f64,
    /// The rebuy USD cap reduced the quantity
    pub capped: bool,
}

/// Realized round-trip P&L
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedPnl {
    pub gross: f64,
    pub fees: f64,
    pub net: f64,
}

/// Risk-based position sizing with a hard USD ceiling on rebuys
///
/// Size depends only on the stop distance: risking `risk_per_trade` of
/// equity over a move of `stop_loss_pct`. The rebuy cap does not scale with
/// equity, so repeated re-entries stay bounded however large equity grows.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    risk_per_trade: f64,
    stop_loss_pct: f64,
    fee: f64,
    slip: f64,
    rebuy_max_usd: f64,
}

impl RiskSizer {
    pub fn from_params(params: &TradingParams) -> Self {
        Self {
            risk_per_trade: params.risk_per_trade,
            stop_loss_pct: params.stop_loss_pct,
            fee: params.fee,
            slip: params.slip,
            rebuy_max_usd: params.rebuy_max_usd,
        }
    }

    /// Quantity to buy at `price` for the given entry type
    pub fn size(&self, equity: f64, price: f64, entry: TradeType) -> PositionSize {
        let risk_per_unit = (price * self.stop_loss_pct).max(RISK_EPSILON);
        let dollars_at_risk = self.risk_per_trade * equity.max(0.0);
        let mut quantity = (dollars_at_risk / risk_per_unit).max(0.0);
        let mut capped = false;

        if price <= 0.0 {
            quantity = 0.0;
        } else if entry.is_rebuy() {
            let cap_qty = self.rebuy_max_usd / price;
            if quantity > cap_qty {
                quantity = cap_qty;
                capped = true;
            }
        }

        PositionSize {
            quantity,
            risk_per_unit,
            dollars_at_risk,
            capped,
        }
    }

    pub fn buy_fill(&self, price: f64) -> f64 {
        price * (1.0 + self.slip)
    }

    pub fn sell_fill(&self, price: f64) -> f64 {
        price * (1.0 - self.slip)
    }

    /// Net P&L of a round trip; fees charged on both legs
    pub fn realized_pnl(&self, entry_fill: f64, exit_fill: f64, quantity: f64) -> RealizedPnl {
        let gross = (exit_fill - entry_fill) * quantity;
        let fees = self.fee * (entry_fill + exit_fill) * quantity;

        RealizedPnl {
            gross,
            fees,
            net: gross - fees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer(rebuy_max_usd: f64) -> RiskSizer {
        RiskSizer::from_params(&TradingParams {
            risk_per_trade: 0.01,
            stop_loss_pct: 0.01,
            fee: 0.0,
            slip: 0.0,
            rebuy_max_usd,
            ..TradingParams::default()
        })
    }

    #[test]
    fn test_risk_based_size() {
        let size = sizer(100.0).size(50_000.0, 100.0, TradeType::BaselineEntry);

        assert_eq!(size.risk_per_unit, 1.0);
        assert_eq!(size.dollars_at_risk, 500.0);
        assert_eq!(size.quantity, 500.0);
        assert!(!size.capped);
    }

    #[test]
    fn test_rebuy_cap() {
        let size = sizer(100.0).size(50_000.0, 100.0, TradeType::RebuyConfirmation);

        assert_eq!(size.quantity, 1.0);
        assert_eq!(size.quantity * 100.0, 100.0);
        assert!(size.capped);
    }

    #[test]
    fn test_cap_ignored_for_baseline() {
        let size = sizer(1.0).size(50_000.0, 100.0, TradeType::BaselineEntry);
        assert_eq!(size.quantity, 500.0);
    }

    #[test]
    fn test_cap_not_flagged_when_not_binding() {
        let size = sizer(1_000_000.0).size(50_000.0, 100.0, TradeType::RebuyKnife);
        assert_eq!(size.quantity, 500.0);
        assert!(!size.capped);
    }

    #[test]
    fn test_cap_independent_of_equity() {
        let s = sizer(250.0);
        for equity in [1_000.0, 50_000.0, 5_000_000.0] {
            let size = s.size(equity, 37.0, TradeType::RebuyKnife);
            assert!(size.quantity * 37.0 <= 250.0 + 1e-9);
        }
    }

    #[test]
    fn test_degenerate_inputs_size_to_zero() {
        let s = sizer(100.0);
        assert_eq!(s.size(0.0, 100.0, TradeType::BaselineEntry).quantity, 0.0);
        assert_eq!(s.size(-10.0, 100.0, TradeType::BaselineEntry).quantity, 0.0);
        assert_eq!(s.size(50_000.0, 0.0, TradeType::BaselineEntry).quantity, 0.0);
    }

    #[test]
    fn test_zero_cost_round_trip_is_flat() {
        let pnl = sizer(100.0).realized_pnl(100.0, 100.0, 12.5);
        assert_eq!(pnl.net, 0.0);
    }

    #[test]
    fn test_fees_and_slippage() {
        let s = RiskSizer::from_params(&TradingParams {
            fee: 0.001,
            slip: 0.01,
            ..TradingParams::default()
        });

        let entry = s.buy_fill(100.0);
        let exit = s.sell_fill(110.0);
        assert!((entry - 101.0).abs() < 1e-9);
        assert!((exit - 108.9).abs() < 1e-9);

        let pnl = s.realized_pnl(entry, exit, 2.0);
        assert!((pnl.gross - 15.8).abs() < 1e-9);
        assert!((pnl.fees - 0.4198).abs() < 1e-9);
        assert!((pnl.net - (15.8 - 0.4198)).abs() < 1e-9);
    }
}
