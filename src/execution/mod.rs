// Collaborator interfaces: execution, market data, equity, trade log
pub mod equity;
pub mod executor;
pub mod market_data;
pub mod trade_log;

pub use equity::{EquitySource, FixedEquity};
pub use executor::{OrderExecutor, PaperExchange};
pub use market_data::{
    next_bar_boundary, CandleFeed, MarketData, ReplayFeed, ReplayMarketData, SyntheticLiveFeed,
    SyntheticMarketData,
};
pub use trade_log::{JsonlTradeLog, MemoryTradeLog, TradeLog};
