use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderCounters {
    /// Entries filled (baseline + rebuy)
    pub total_trades: u64,
    pub crash_exits: u64,
    pub normal_exits: u64,
    pub rebuy_trades: u64,
    /// Rebuys whose size the USD cap reduced
    pub capped_rebuys: u64,
}

/// Mutable position state of one symbol, owned by exactly one trader
///
/// Invariants (see [`PositionState::check_invariants`]):
/// - holding implies `entry_price > 0` and `peak_since_entry >= entry_price`
/// - never armed for rebuy while holding
/// - `rebuy_ready_at` only set while armed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub position_qty: f64,
    pub entry_price: f64,
    pub peak_since_entry: f64,
    pub entry_type: Option<TradeType>,
    pub entry_time: Option<DateTime<Utc>>,
    /// Realized equity; changes only when a sell is filled
    pub equity: f64,
    pub rebuy_armed: bool,
    pub rebuy_price: f64,
    pub rebuy_ready_at: Option<DateTime<Utc>>,
    pub counters: TraderCounters,
}

impl PositionState {
    pub fn flat(equity: f64) -> Self {
        Self {
            position_qty: 0.0,
            entry_price: 0.0,
            peak_since_entry: 0.0,
            entry_type: None,
            entry_time: None,
            equity,
            rebuy_armed: false,
            rebuy_price: 0.0,
            rebuy_ready_at: None,
            counters: TraderCounters::default(),
        }
    }

    pub fn is_holding(&self) -> bool {
        self.position_qty > 0.0
    }

    /// Close out the position fields (equity and rebuy fields untouched)
    pub(crate) fn clear_position(&mut self) {
        self.position_qty = 0.0;
        self.entry_price = 0.0;
        self.peak_since_entry = 0.0;
        self.entry_type = None;
        self.entry_time = None;
    }

    pub(crate) fn disarm(&mut self) {
        self.rebuy_armed = false;
        self.rebuy_price = 0.0;
        self.rebuy_ready_at = None;
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        if self.position_qty < 0.0 {
            return Err(format!("negative position {}", self.position_qty));
        }
        if self.is_holding() {
            if self.entry_price <= 0.0 {
                return Err(format!("holding with entry price {}", self.entry_price));
            }
            if self.peak_since_entry < self.entry_price {
                return Err(format!(
                    "peak {} below entry {}",
                    self.peak_since_entry, self.entry_price
                ));
            }
            if self.rebuy_armed {
                return Err("armed for rebuy while holding".to_string());
            }
        }
        if !self.rebuy_armed && self.rebuy_ready_at.is_some() {
            return Err("rebuy_ready_at set while not armed".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_state_is_consistent() {
        let state = PositionState::flat(10_000.0);
        assert!(!state.is_holding());
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn test_detects_armed_while_holding() {
        let mut state = PositionState::flat(10_000.0);
        state.position_qty = 1.0;
        state.entry_price = 100.0;
        state.peak_since_entry = 100.0;
        state.rebuy_armed = true;

        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_detects_peak_below_entry() {
        let mut state = PositionState::flat(10_000.0);
        state.position_qty = 1.0;
        state.entry_price = 100.0;
        state.peak_since_entry = 99.0;

        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_detects_orphan_ready_time() {
        let mut state = PositionState::flat(10_000.0);
        state.rebuy_ready_at = Some(Utc::now());
        assert!(state.check_invariants().is_err());
    }
}
