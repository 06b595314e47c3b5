/// Average True Range (ATR) indicator
///
/// Measures market volatility by averaging true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// The average is a simple mean of the last `period` true ranges.
use crate::models::Candle;

/// True range of `candle` given the previous close
pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    (candle.high - candle.low)
        .max((candle.high - prev_close).abs())
        .max((candle.low - prev_close).abs())
}

/// Calculate ATR for the given candles
///
/// Needs `period + 1` candles (each true range needs a previous close).
/// Returns None if insufficient data.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let recent = &candles[candles.len() - (period + 1)..];
    let sum: f64 = recent
        .windows(2)
        .map(|pair| true_range(&pair[1], pair[0].close))
        .sum();

    Some(sum / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(prices: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                timestamp: Utc::now() + chrono::Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_calculate_atr() {
        // Low volatility market
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 15]);
        let atr = calculate_atr(&candles, 14);

        // Every true range is exactly high - low
        assert_eq!(atr, Some(2.0));
    }

    #[test]
    fn test_true_range_uses_gaps() {
        let candles = create_test_candles(&[
            (100.0, 101.0, 99.0, 100.0),
            (110.0, 112.0, 108.0, 111.0), // gap up: |112 - 100| = 12
        ]);

        assert_eq!(true_range(&candles[1], candles[0].close), 12.0);
        assert_eq!(calculate_atr(&candles, 1), Some(12.0));
    }

    #[test]
    fn test_atr_only_uses_trailing_period() {
        let mut prices = vec![(100.0, 130.0, 70.0, 100.0); 10]; // wild history
        prices.extend(vec![(100.0, 101.0, 99.0, 100.0); 4]);

        let candles = create_test_candles(&prices);
        assert_eq!(calculate_atr(&candles, 3), Some(2.0));
    }

    #[test]
    fn test_calculate_atr_high_volatility() {
        let high_vol_prices = vec![
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 110.0, 98.0, 105.0),
            (105.0, 108.0, 92.0, 95.0),
            (95.0, 103.0, 88.0, 100.0),
            (100.0, 115.0, 97.0, 110.0),
            (110.0, 112.0, 95.0, 98.0),
            (98.0, 108.0, 90.0, 105.0),
            (105.0, 120.0, 100.0, 115.0),
            (115.0, 118.0, 105.0, 110.0),
            (110.0, 125.0, 108.0, 120.0),
            (120.0, 130.0, 115.0, 125.0),
            (125.0, 128.0, 110.0, 115.0),
            (115.0, 122.0, 105.0, 118.0),
            (118.0, 130.0, 115.0, 125.0),
            (125.0, 135.0, 120.0, 130.0),
        ];

        let candles = create_test_candles(&high_vol_prices);
        let atr = calculate_atr(&candles, 14);

        assert!(atr.unwrap() > 10.0);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 14]);
        assert!(calculate_atr(&candles, 14).is_none());
    }
}
