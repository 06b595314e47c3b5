use thiserror::Error;

/// Errors surfaced by the engine and its collaborators
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid config: {field} {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("unknown rebuy mode '{0}' (expected 'confirmation' or 'knife')")]
    UnknownRebuyMode(String),

    #[error("failed to load config: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("order for {symbol} failed: {reason}")]
    Execution { symbol: String, reason: String },

    #[error("market data for {symbol} unavailable: {reason}")]
    MarketData { symbol: String, reason: String },

    #[error("equity snapshot unavailable: {0}")]
    Equity(String),

    #[error("trade log write failed: {0}")]
    TradeLog(#[from] std::io::Error),

    #[error("trade serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
}

impl EngineError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
