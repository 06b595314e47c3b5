use std::collections::{HashMap, VecDeque};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::backtest::SyntheticDataGenerator;
use crate::error::EngineError;
use crate::models::Candle;
use crate::Result;

/// Delay after a bar boundary before the bar is treated as closed
pub const BAR_SETTLE: StdDuration = StdDuration::from_secs(2);

/// Stream of closed candles for one symbol
#[async_trait]
pub trait CandleFeed: Send {
    /// Historical bars used to warm indicators before trading
    async fn warmup(&mut self, _bars: usize) -> Result<Vec<Candle>> {
        Ok(Vec::new())
    }

    /// Wait for the next closed candle. `None` means the stream has ended.
    async fn next_closed_candle(&mut self) -> Result<Option<Candle>>;
}

/// Market-data collaborator: hands out one feed per symbol
pub trait MarketData: Send + Sync {
    fn subscribe(&self, symbol: &str, timeframe_minutes: u32) -> Result<Box<dyn CandleFeed>>;
}

/// Next bar close strictly after `now` (e.g. XX:00, XX:05 for 5-minute bars)
pub fn next_bar_boundary(now: DateTime<Utc>, timeframe_minutes: u32) -> DateTime<Utc> {
    let period = i64::from(timeframe_minutes.max(1)) * 60;
    let next = (now.timestamp().div_euclid(period) + 1) * period;

    Utc.timestamp_opt(next, 0)
        .single()
        .unwrap_or_else(|| now + Duration::seconds(period))
}

/// Pre-recorded candles, optionally paced
pub struct ReplayFeed {
    history: Vec<Candle>,
    candles: VecDeque<Candle>,
    pace: Option<StdDuration>,
}

impl ReplayFeed {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            history: Vec::new(),
            candles: candles.into(),
            pace: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Candle>) -> Self {
        self.history = history;
        self
    }

    /// Sleep this long before yielding each candle
    pub fn with_pace(mut self, pace: StdDuration) -> Self {
        self.pace = Some(pace);
        self
    }
}

#[async_trait]
impl CandleFeed for ReplayFeed {
    async fn warmup(&mut self, bars: usize) -> Result<Vec<Candle>> {
        let skip = self.history.len().saturating_sub(bars);
        Ok(self.history[skip..].to_vec())
    }

    async fn next_closed_candle(&mut self) -> Result<Option<Candle>> {
        if let Some(pace) = self.pace {
            tokio::time::sleep(pace).await;
        }
        Ok(self.candles.pop_front())
    }
}

/// Replays a fixed candle set per symbol
#[derive(Default)]
pub struct ReplayMarketData {
    series: HashMap<String, Vec<Candle>>,
    history: HashMap<String, Vec<Candle>>,
    pace: Option<StdDuration>,
}

impl ReplayMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.series.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_history(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.history.insert(symbol.to_string(), candles);
        self
    }

    pub fn with_pace(mut self, pace: StdDuration) -> Self {
        self.pace = Some(pace);
        self
    }
}

impl MarketData for ReplayMarketData {
    fn subscribe(&self, symbol: &str, _timeframe_minutes: u32) -> Result<Box<dyn CandleFeed>> {
        let candles = self
            .series
            .get(symbol)
            .cloned()
            .ok_or_else(|| EngineError::MarketData {
                symbol: symbol.to_string(),
                reason: "no replay series".to_string(),
            })?;

        let mut feed = ReplayFeed::new(candles)
            .with_history(self.history.get(symbol).cloned().unwrap_or_default());
        if let Some(pace) = self.pace {
            feed = feed.with_pace(pace);
        }
        Ok(Box::new(feed))
    }
}

/// Clock-aligned random-walk feed for paper runs
pub struct SyntheticLiveFeed {
    generator: SyntheticDataGenerator,
    timeframe_minutes: u32,
    volatility: f64,
    last_close: f64,
}

impl SyntheticLiveFeed {
    pub fn new(seed: u64, start_price: f64, timeframe_minutes: u32, volatility: f64) -> Self {
        Self {
            generator: SyntheticDataGenerator::new(seed).with_base_price(start_price),
            timeframe_minutes,
            volatility,
            last_close: start_price,
        }
    }
}

#[async_trait]
impl CandleFeed for SyntheticLiveFeed {
    async fn warmup(&mut self, bars: usize) -> Result<Vec<Candle>> {
        let boundary = next_bar_boundary(Utc::now(), self.timeframe_minutes);
        let step = Duration::minutes(i64::from(self.timeframe_minutes));

        let mut candles = Vec::with_capacity(bars);
        for i in (1..=bars).rev() {
            let timestamp = boundary - step * (i as i32);
            let candle = self
                .generator
                .next_candle(self.last_close, timestamp, self.volatility);
            self.last_close = candle.close;
            candles.push(candle);
        }
        Ok(candles)
    }

    async fn next_closed_candle(&mut self) -> Result<Option<Candle>> {
        let now = Utc::now();
        let boundary = next_bar_boundary(now, self.timeframe_minutes);
        let wait = (boundary - now).to_std().unwrap_or(StdDuration::ZERO) + BAR_SETTLE;

        tokio::time::sleep(wait).await;

        let candle = self
            .generator
            .next_candle(self.last_close, boundary, self.volatility);
        self.last_close = candle.close;
        Ok(Some(candle))
    }
}

/// Hands every symbol its own seeded synthetic feed
pub struct SyntheticMarketData {
    seed: u64,
    start_price: f64,
    volatility: f64,
}

impl SyntheticMarketData {
    pub fn new(seed: u64, start_price: f64, volatility: f64) -> Self {
        Self {
            seed,
            start_price,
            volatility,
        }
    }
}

impl MarketData for SyntheticMarketData {
    fn subscribe(&self, symbol: &str, timeframe_minutes: u32) -> Result<Box<dyn CandleFeed>> {
        // Distinct but reproducible stream per symbol
        let symbol_seed = symbol
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));

        Ok(Box::new(SyntheticLiveFeed::new(
            symbol_seed,
            self.start_price,
            timeframe_minutes,
            self.volatility,
        )))
    }
}
