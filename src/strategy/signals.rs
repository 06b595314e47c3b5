use serde::{Deserialize, Serialize};

use crate::indicators::BollingerBands;
use crate::models::Candle;

/// Why a normal (non-crash) exit fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitSignal {
    UpperBand,
    TakeProfit,
    StopLoss,
    /// Position closed because the replayed series ran out
    EndOfData,
}

/// Baseline mean-reversion entry: close at or below the lower band
///
/// No bands (still warming up) means no entry.
pub fn entry_signal(close: f64, bands: Option<&BollingerBands>) -> bool {
    match bands {
        Some(bands) => close > 0.0 && close <= bands.lower,
        None => false,
    }
}

/// Normal exit check for an open position
///
/// Any of: close reaches the upper band, close reaches the take-profit level,
/// or the bar's low touches the stop-loss level. The band leg is skipped
/// while bands are undefined; the price legs always apply.
pub fn exit_signal(
    candle: &Candle,
    entry_price: f64,
    bands: Option<&BollingerBands>,
    take_profit_pct: f64,
    stop_loss_pct: f64,
) -> Option<ExitSignal> {
    if entry_price <= 0.0 {
        return None;
    }

    if bands.is_some_and(|b| candle.close >= b.upper) {
        return Some(ExitSignal::UpperBand);
    }
    if candle.close >= entry_price * (1.0 + take_profit_pct) {
        return Some(ExitSignal::TakeProfit);
    }
    if candle.low <= entry_price * (1.0 - stop_loss_pct) {
        return Some(ExitSignal::StopLoss);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bands() -> BollingerBands {
        BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        }
    }

    fn candle(low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high: close.max(low),
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_entry_at_lower_band() {
        assert!(entry_signal(90.0, Some(&bands())));
        assert!(entry_signal(85.0, Some(&bands())));
        assert!(!entry_signal(90.01, Some(&bands())));
    }

    #[test]
    fn test_no_entry_without_bands() {
        assert!(!entry_signal(1.0, None));
    }

    #[test]
    fn test_exit_on_upper_band() {
        let signal = exit_signal(&candle(105.0, 110.0), 100.0, Some(&bands()), 0.5, 0.02);
        assert_eq!(signal, Some(ExitSignal::UpperBand));
    }

    #[test]
    fn test_exit_on_take_profit() {
        let signal = exit_signal(&candle(103.0, 104.0), 100.0, Some(&bands()), 0.04, 0.02);
        assert_eq!(signal, Some(ExitSignal::TakeProfit));
    }

    #[test]
    fn test_exit_on_stop_loss_wick() {
        // close holds up but the low pierced 98
        let signal = exit_signal(&candle(97.5, 100.5), 100.0, Some(&bands()), 0.04, 0.02);
        assert_eq!(signal, Some(ExitSignal::StopLoss));
    }

    #[test]
    fn test_hold_inside_range() {
        let signal = exit_signal(&candle(99.0, 101.0), 100.0, Some(&bands()), 0.04, 0.02);
        assert!(signal.is_none());
    }

    #[test]
    fn test_price_exits_apply_without_bands() {
        let signal = exit_signal(&candle(90.0, 95.0), 100.0, None, 0.04, 0.02);
        assert_eq!(signal, Some(ExitSignal::StopLoss));
    }
}
