/// Calculate Simple Moving Average (SMA) over the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Population standard deviation (ddof = 0) over the last `period` values
pub fn calculate_std(prices: &[f64], period: usize) -> Option<f64> {
    let mean = calculate_sma(prices, period)?;

    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| {
            let diff = p - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_uses_trailing_window() {
        let prices = vec![1.0, 1.0, 10.0, 20.0];
        assert_eq!(calculate_sma(&prices, 2), Some(15.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
        assert!(calculate_sma(&prices, 0).is_none());
    }

    #[test]
    fn test_std() {
        // mean 5, squared deviations sum to 32, /8 = 4
        let prices = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = calculate_std(&prices, 8).unwrap();
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_std_flat_prices() {
        let prices = vec![100.0; 20];
        assert_eq!(calculate_std(&prices, 20), Some(0.0));
    }
}
