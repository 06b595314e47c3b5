use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::EngineError;
use crate::models::{Fill, OrderIntent};
use crate::Result;

/// Exchange-execution collaborator
///
/// Returns a fill confirmation or an error. Callers must not mutate position
/// state unless this returns `Ok`.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit(&self, intent: &OrderIntent) -> Result<Fill>;
}

/// Paper execution: fills every order in full at its intended price
#[derive(Default)]
pub struct PaperExchange {
    submitted: Mutex<Vec<OrderIntent>>,
}

impl PaperExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every intent filled so far, in submission order
    pub fn submitted(&self) -> Vec<OrderIntent> {
        self.submitted
            .lock()
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OrderExecutor for PaperExchange {
    async fn submit(&self, intent: &OrderIntent) -> Result<Fill> {
        if intent.quantity <= 0.0 || intent.price <= 0.0 {
            return Err(EngineError::Execution {
                symbol: intent.symbol.clone(),
                reason: format!(
                    "rejected {:?} qty {} @ {}",
                    intent.side, intent.quantity, intent.price
                ),
            });
        }

        self.submitted
            .lock()
            .map_err(|e| EngineError::Execution {
                symbol: intent.symbol.clone(),
                reason: e.to_string(),
            })?
            .push(intent.clone());

        tracing::debug!(
            symbol = %intent.symbol,
            "Paper fill {:?} {:.6} @ ${:.4}",
            intent.side,
            intent.quantity,
            intent.price
        );

        Ok(Fill {
            price: intent.price,
            quantity: intent.quantity,
            timestamp: Utc::now(),
        })
    }
}
