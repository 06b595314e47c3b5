use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed OHLCV bar. `timestamp` is the bar close time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// What caused an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    BaselineEntry,
    RebuyConfirmation,
    RebuyKnife,
    NormalExit,
    CrashExit,
}

impl TradeType {
    pub fn side(&self) -> TradeSide {
        match self {
            TradeType::BaselineEntry | TradeType::RebuyConfirmation | TradeType::RebuyKnife => {
                TradeSide::Buy
            }
            TradeType::NormalExit | TradeType::CrashExit => TradeSide::Sell,
        }
    }

    pub fn is_rebuy(&self) -> bool {
        matches!(self, TradeType::RebuyConfirmation | TradeType::RebuyKnife)
    }
}

/// Order handed to the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    /// Expected fill price (slippage already applied)
    pub price: f64,
    pub trade_type: TradeType,
}

/// Fill confirmation returned by the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of an executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub trade_type: TradeType,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    /// Net realized P&L (zero for buys)
    pub pnl: f64,
    pub fees: f64,
    /// Equity after this trade
    pub equity: f64,
    /// True when the rebuy USD cap reduced the quantity
    pub capped: bool,
}
