use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{Candle, TradeType};

/// Support reclaim multiplier for confirmation re-entries (+1% above recent low)
const CONFIRMATION_RECLAIM: f64 = 1.01;

/// Fixed discount for knife-catch re-entries (-2.5% from close)
const KNIFE_DISCOUNT: f64 = 0.975;

/// How a crashed-out symbol is allowed back in
///
/// - `Confirmation`: wait for price to reclaim support, buy at or above the trigger
/// - `Knife`: buy a fixed discount below the crash close, at or below the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RebuyMode {
    Confirmation,
    Knife,
}

impl RebuyMode {
    /// Re-entry trigger price for the current window
    ///
    /// Returns None when the window holds no usable price.
    pub fn trigger_price(&self, window: &[Candle], lookback: usize) -> Option<f64> {
        match self {
            RebuyMode::Confirmation => {
                let support = window
                    .iter()
                    .rev()
                    .take(lookback.max(1))
                    .map(|c| c.low)
                    .filter(|low| *low > 0.0)
                    .fold(f64::INFINITY, f64::min);

                support
                    .is_finite()
                    .then_some(support * CONFIRMATION_RECLAIM)
            }
            RebuyMode::Knife => window
                .last()
                .map(|c| c.close)
                .filter(|close| *close > 0.0)
                .map(|close| close * KNIFE_DISCOUNT),
        }
    }

    /// Whether this close satisfies the re-entry trigger
    pub fn should_fire(&self, close: f64, rebuy_price: f64) -> bool {
        if rebuy_price <= 0.0 {
            return false;
        }
        match self {
            RebuyMode::Confirmation => close >= rebuy_price,
            RebuyMode::Knife => close <= rebuy_price,
        }
    }

    pub fn entry_type(&self) -> TradeType {
        match self {
            RebuyMode::Confirmation => TradeType::RebuyConfirmation,
            RebuyMode::Knife => TradeType::RebuyKnife,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RebuyMode::Confirmation => "confirmation",
            RebuyMode::Knife => "knife",
        }
    }
}

impl fmt::Display for RebuyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebuyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmation" => Ok(RebuyMode::Confirmation),
            "knife" => Ok(RebuyMode::Knife),
            _ => Err(EngineError::UnknownRebuyMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for RebuyMode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RebuyMode> for String {
    fn from(mode: RebuyMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Computes and refreshes the re-entry trigger price while a symbol is armed
#[derive(Debug, Clone)]
pub struct RebuyPriceCalculator {
    mode: RebuyMode,
    lookback: usize,
    dynamic: bool,
}

impl RebuyPriceCalculator {
    pub fn new(mode: RebuyMode, lookback: usize, dynamic: bool) -> Self {
        Self {
            mode,
            lookback,
            dynamic,
        }
    }

    pub fn mode(&self) -> RebuyMode {
        self.mode
    }

    /// Price captured at arm time (crash exit tick)
    pub fn arm_price(&self, window: &[Candle]) -> Option<f64> {
        self.mode.trigger_price(window, self.lookback)
    }

    /// Per-tick refresh from the bars preceding the one being tested.
    /// Frozen at the armed value unless dynamic.
    pub fn refresh(&self, current: f64, window: &[Candle]) -> f64 {
        if !self.dynamic {
            return current;
        }
        self.mode
            .trigger_price(window, self.lookback)
            .unwrap_or(current)
    }
}
