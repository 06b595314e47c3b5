use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::EngineError;
use crate::models::Trade;
use crate::Result;

/// Append-only record of executed actions
pub trait TradeLog: Send + Sync {
    fn record(&self, trade: &Trade) -> Result<()>;
}

/// In-memory log, shared across workers
#[derive(Default)]
pub struct MemoryTradeLog {
    trades: Mutex<Vec<Trade>>,
}

impl MemoryTradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.trades
            .lock()
            .map(|trades| trades.clone())
            .unwrap_or_default()
    }

    pub fn trades_for(&self, symbol: &str) -> Vec<Trade> {
        self.trades()
            .into_iter()
            .filter(|t| t.symbol == symbol)
            .collect()
    }
}

impl TradeLog for MemoryTradeLog {
    fn record(&self, trade: &Trade) -> Result<()> {
        self.trades
            .lock()
            .map_err(|e| EngineError::TradeLog(std::io::Error::other(e.to_string())))?
            .push(trade.clone());
        Ok(())
    }
}

/// One JSON object per line, flushed after every trade
pub struct JsonlTradeLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlTradeLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::info!("Trade log at {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLog for JsonlTradeLog {
    fn record(&self, trade: &Trade) -> Result<()> {
        let line = serde_json::to_string(trade)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| EngineError::TradeLog(std::io::Error::other(e.to_string())))?;

        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TradeSide, TradeType};
    use chrono::Utc;
    use uuid::Uuid;

    fn trade(symbol: &str, trade_type: TradeType) -> Trade {
        Trade {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            time: Utc::now(),
            trade_type,
            side: trade_type.side(),
            price: 100.0,
            quantity: 1.0,
            pnl: 0.0,
            fees: 0.0,
            equity: 10_000.0,
            capped: false,
        }
    }

    #[test]
    fn test_memory_log_filters_by_symbol() {
        let log = MemoryTradeLog::new();
        log.record(&trade("BTC", TradeType::BaselineEntry)).unwrap();
        log.record(&trade("ETH", TradeType::BaselineEntry)).unwrap();
        log.record(&trade("BTC", TradeType::NormalExit)).unwrap();

        assert_eq!(log.trades().len(), 3);
        let btc = log.trades_for("BTC");
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[1].side, TradeSide::Sell);
    }

    #[test]
    fn test_jsonl_appends_lines() {
        let path = std::env::temp_dir().join(format!("rebuybot-trades-{}.jsonl", Uuid::new_v4()));

        {
            let log = JsonlTradeLog::open(&path).unwrap();
            log.record(&trade("BTC", TradeType::CrashExit)).unwrap();
            log.record(&trade("BTC", TradeType::RebuyKnife)).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"CRASH_EXIT\""));

        let parsed: Trade = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.trade_type, TradeType::RebuyKnife);

        let _ = std::fs::remove_file(&path);
    }
}
