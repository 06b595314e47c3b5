use async_trait::async_trait;

use crate::Result;

/// Portfolio/ledger collaborator providing an equity snapshot (USD)
///
/// Read once per decision cycle. Without one, each trader sizes from its
/// own realized-equity ledger.
#[async_trait]
pub trait EquitySource: Send + Sync {
    async fn equity_usd(&self, symbol: &str) -> Result<f64>;
}

/// Constant equity, mostly useful for paper runs
pub struct FixedEquity(pub f64);

#[async_trait]
impl EquitySource for FixedEquity {
    async fn equity_usd(&self, _symbol: &str) -> Result<f64> {
        Ok(self.0)
    }
}
