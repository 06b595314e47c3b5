/// Bollinger Bands
///
/// Rolling SMA of closes with an envelope of `num_std` population standard
/// deviations above and below.
use serde::{Deserialize, Serialize};

use super::moving_average::{calculate_sma, calculate_std};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate bands over the trailing `period` closes
///
/// Returns None until `period` closes exist
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(closes, period)?;
    let std = calculate_std(closes, period)?;

    Some(BollingerBands {
        upper: middle + num_std * std,
        middle,
        lower: middle - num_std * std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_prices_collapse_bands() {
        let closes = vec![100.0; 20];
        let bands = calculate_bollinger(&closes, 20, 2.0).unwrap();

        assert_eq!(bands.upper, 100.0);
        assert_eq!(bands.middle, 100.0);
        assert_eq!(bands.lower, 100.0);
    }

    #[test]
    fn test_band_width() {
        // mean 5, population std 2
        let closes = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = calculate_bollinger(&closes, 8, 2.0).unwrap();

        assert!((bands.middle - 5.0).abs() < 1e-12);
        assert!((bands.upper - 9.0).abs() < 1e-12);
        assert!((bands.lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_history() {
        let closes = vec![100.0; 19];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
    }

    #[test]
    fn test_pure_function() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let a = calculate_bollinger(&closes, 20, 2.0);
        let b = calculate_bollinger(&closes, 20, 2.0);
        assert_eq!(a, b);
    }
}
