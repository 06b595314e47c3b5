// Technical indicators module
// Bollinger Bands and ATR over a trailing candle window

pub mod atr;
pub mod bollinger;
pub mod moving_average;

pub use atr::{calculate_atr, true_range};
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use moving_average::{calculate_sma, calculate_std};

use crate::config::TradingParams;
use crate::models::Candle;

/// Indicator values for one tick. `None` means not enough history yet,
/// which callers treat as "no signal".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub bands: Option<BollingerBands>,
    pub atr: Option<f64>,
}

/// Compute every indicator the decision cascade needs from the window
pub fn compute_indicators(candles: &[Candle], params: &TradingParams) -> IndicatorSnapshot {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    IndicatorSnapshot {
        bands: calculate_bollinger(&closes, params.bb_period, params.bb_std),
        atr: calculate_atr(candles, params.atr_period),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn flat_candles(n: usize) -> Vec<Candle> {
        let start = Utc::now();
        (0..n)
            .map(|i| Candle {
                timestamp: start + Duration::minutes(i as i64 * 5),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_warming_up_yields_no_values() {
        let params = TradingParams::default();
        let snapshot = compute_indicators(&flat_candles(5), &params);
        assert_eq!(snapshot, IndicatorSnapshot::default());
    }

    #[test]
    fn test_full_window_yields_values() {
        let params = TradingParams::default();
        let snapshot = compute_indicators(&flat_candles(params.window_len()), &params);

        assert!(snapshot.bands.is_some());
        assert_eq!(snapshot.atr, Some(2.0));
    }
}
