use std::collections::VecDeque;

use crate::models::Candle;

/// Rolling window of closed candles for a single symbol
///
/// Append-only: a candle must be strictly newer than the last one.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    max_candles: usize,
}

impl CandleWindow {
    /// Create a new window
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles kept; older ones are dropped
    pub fn new(max_candles: usize) -> Self {
        let max_candles = max_candles.max(1);
        Self {
            candles: VecDeque::with_capacity(max_candles + 1),
            max_candles,
        }
    }

    /// Add a candle. Returns false (and keeps the window unchanged) when the
    /// candle is not newer than the last one.
    pub fn push(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.candles.back() {
            if candle.timestamp <= last.timestamp {
                return false;
            }
        }

        self.candles.push_back(candle);

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }

        true
    }

    /// Contiguous view, oldest first
    pub fn as_slice(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_candles
    }
}
