use crate::models::Candle;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
    /// Rally, sharp reversal, then recovery
    FlashCrash,
}

impl MarketScenario {
    pub fn all() -> [MarketScenario; 5] {
        [
            MarketScenario::Uptrend,
            MarketScenario::Downtrend,
            MarketScenario::Sideways,
            MarketScenario::Volatile,
            MarketScenario::FlashCrash,
        ]
    }
}

/// Generates synthetic price data for backtesting and paper feeds
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of candles to generate
    /// * `interval_minutes` - Minutes between candles
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let start_time = Utc::now() - Duration::minutes(num_candles as i64 * interval_minutes);
        self.generate_from(scenario, start_time, num_candles, interval_minutes)
    }

    /// Same as [`generate`](Self::generate) with an explicit first timestamp
    pub fn generate_from(
        &mut self,
        scenario: MarketScenario,
        start_time: DateTime<Utc>,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;
        let mean_price = self.base_price;

        // ±2% per day spread over the interval count in a day
        let daily_drift = 0.02 / (24.0 * 60.0 / interval_minutes as f64);

        for i in 0..num_candles {
            let timestamp = start_time + Duration::minutes(i as i64 * interval_minutes);

            current_price += match scenario {
                MarketScenario::Uptrend => {
                    current_price * (daily_drift + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Downtrend => {
                    current_price * (-daily_drift + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Sideways => {
                    // 10% pull to mean plus ±1% noise
                    (mean_price - current_price) * 0.1
                        + current_price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => current_price * self.rng.gen_range(-0.05..0.05),
                MarketScenario::FlashCrash => {
                    current_price * self.flash_crash_return(i, num_candles)
                }
            };

            // Prevent price from going too low
            current_price = current_price.max(self.base_price * 0.3);

            let candle = self.create_candle(current_price, timestamp);
            candles.push(candle);
        }

        candles
    }

    /// Per-bar return for the flash crash shape:
    /// first 40% rallies, next 10% dumps ~30%, remainder chops upward
    fn flash_crash_return(&mut self, i: usize, num_candles: usize) -> f64 {
        let rally_end = num_candles * 4 / 10;
        let crash_end = num_candles / 2;

        if i < rally_end {
            self.rng.gen_range(-0.004..0.008)
        } else if i < crash_end {
            let crash_bars = (crash_end - rally_end).max(1) as f64;
            -0.30 / crash_bars + self.rng.gen_range(-0.005..0.005)
        } else {
            self.rng.gen_range(-0.006..0.0075)
        }
    }

    /// One random-walk bar following `prev_close`
    pub fn next_candle(&mut self, prev_close: f64, timestamp: DateTime<Utc>, volatility: f64) -> Candle {
        let volatility = volatility.abs().max(1e-6);
        let change = self.rng.gen_range(-volatility..volatility);
        let price = (prev_close * (1.0 + change)).max(self.base_price * 0.01);
        self.create_candle(price, timestamp)
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(&mut self, price: f64, timestamp: DateTime<Utc>) -> Candle {
        // Create realistic OHLC from close price
        let noise_pct = 0.002; // ±0.2% intrabar movement

        // Generate high and low around the close price
        let high = price * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - self.rng.gen_range(0.0..noise_pct));

        // Generate open and clamp it between low and high
        let open_raw = price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct));
        let open = open_raw.clamp(low, high);

        // Vary volume ±30%
        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }
}
