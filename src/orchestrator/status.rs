use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::strategy::RebuyMode;
use crate::trader::TraderCounters;

/// Copy-on-read view of one trader, published after every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderSnapshot {
    pub symbol: String,
    pub running: bool,
    pub trading_enabled: bool,
    pub position_qty: f64,
    pub entry_price: f64,
    pub peak_since_entry: f64,
    pub equity: f64,
    pub rebuy_armed: bool,
    pub rebuy_price: f64,
    pub rebuy_mode: RebuyMode,
    pub rebuy_ready_at: Option<DateTime<Utc>>,
    pub counters: TraderCounters,
    pub last_candle_at: Option<DateTime<Utc>>,
    /// Most recent failure on this symbol, cleared by the next successful fill
    pub last_error: Option<String>,
}

impl TraderSnapshot {
    pub fn is_holding(&self) -> bool {
        self.position_qty > 0.0
    }
}

/// Per-symbol status line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStatus {
    pub symbol: String,
    pub running: bool,
    pub trading_enabled: bool,
    pub rebuy_armed: bool,
    pub holding: bool,
    pub position_qty: f64,
    pub rebuy_price: f64,
    pub equity: f64,
    pub total_trades: u64,
    pub last_error: Option<String>,
}

impl From<&TraderSnapshot> for SymbolStatus {
    fn from(snapshot: &TraderSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol.clone(),
            running: snapshot.running,
            trading_enabled: snapshot.trading_enabled,
            rebuy_armed: snapshot.rebuy_armed,
            holding: snapshot.is_holding(),
            position_qty: snapshot.position_qty,
            rebuy_price: snapshot.rebuy_price,
            equity: snapshot.equity,
            total_trades: snapshot.counters.total_trades,
            last_error: snapshot.last_error.clone(),
        }
    }
}

/// An armed symbol waiting to re-enter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuyOpportunity {
    pub symbol: String,
    pub price: f64,
    pub mode: RebuyMode,
    pub ready_at: Option<DateTime<Utc>>,
    /// Cooldown has elapsed as of the symbol's latest candle
    pub ready: bool,
}

impl RebuyOpportunity {
    /// `None` unless the snapshot is armed
    ///
    /// Readiness is judged on the trader's own clock (its last candle time),
    /// falling back to `now` before any candle has arrived.
    pub fn from_snapshot(snapshot: &TraderSnapshot, now: DateTime<Utc>) -> Option<Self> {
        if !snapshot.rebuy_armed {
            return None;
        }

        let clock = snapshot.last_candle_at.unwrap_or(now);
        let ready = snapshot.rebuy_ready_at.map_or(true, |at| clock >= at);

        Some(Self {
            symbol: snapshot.symbol.clone(),
            price: snapshot.rebuy_price,
            mode: snapshot.rebuy_mode,
            ready_at: snapshot.rebuy_ready_at,
            ready,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn snapshot() -> TraderSnapshot {
        TraderSnapshot {
            symbol: "SOL/USDT".to_string(),
            running: true,
            trading_enabled: true,
            position_qty: 0.0,
            entry_price: 0.0,
            peak_since_entry: 0.0,
            equity: 10_000.0,
            rebuy_armed: false,
            rebuy_price: 0.0,
            rebuy_mode: RebuyMode::Knife,
            rebuy_ready_at: None,
            counters: TraderCounters::default(),
            last_candle_at: None,
            last_error: None,
        }
    }

    #[test]
    fn test_flat_symbol_has_no_opportunity() {
        assert!(RebuyOpportunity::from_snapshot(&snapshot(), Utc::now()).is_none());
    }

    #[test]
    fn test_opportunity_readiness_uses_candle_clock() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut armed = snapshot();
        armed.rebuy_armed = true;
        armed.rebuy_price = 97.5;
        armed.rebuy_ready_at = Some(t0 + Duration::minutes(60));
        armed.last_candle_at = Some(t0 + Duration::minutes(30));

        // Wall clock is far past ready_at, but the feed is not
        let opportunity = RebuyOpportunity::from_snapshot(&armed, Utc::now()).unwrap();
        assert_eq!(opportunity.price, 97.5);
        assert_eq!(opportunity.mode, RebuyMode::Knife);
        assert!(!opportunity.ready);

        armed.last_candle_at = Some(t0 + Duration::minutes(60));
        assert!(RebuyOpportunity::from_snapshot(&armed, Utc::now()).unwrap().ready);
    }

    #[test]
    fn test_status_from_snapshot() {
        let mut snap = snapshot();
        snap.position_qty = 1.5;
        snap.counters.total_trades = 3;

        let status = SymbolStatus::from(&snap);
        assert!(status.holding);
        assert!(!status.rebuy_armed);
        assert_eq!(status.total_trades, 3);
    }
}
