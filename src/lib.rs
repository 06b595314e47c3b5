// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod orchestrator;
pub mod risk;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use config::{EngineConfig, TradingParams};
pub use error::EngineError;
pub use models::*;
pub use orchestrator::MultiSymbolOrchestrator;
pub use trader::SymbolTrader;

// Error handling
pub type Result<T> = std::result::Result<T, EngineError>;
