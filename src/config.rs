use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::strategy::RebuyMode;
use crate::Result;

/// Per-symbol trading parameters, fixed for the life of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradingParams {
    /// Fee rate per side (e.g. 0.001 = 0.1%)
    pub fee: f64,
    /// Slippage per side (e.g. 0.0005 = 5 bps)
    pub slip: f64,
    /// Fraction of equity risked per trade
    pub risk_per_trade: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,

    pub bb_period: usize,
    pub bb_std: f64,
    pub atr_period: usize,

    /// Drop from peak (in ATRs) that trips the crash failsafe
    pub crash_atr_mult: f64,
    /// Drop from peak (fraction) that trips the crash failsafe
    pub crash_dd_pct: f64,
    /// Only crash-exit while above breakeven
    pub crash_require_profit: bool,
    pub crash_min_profit_pct: f64,

    pub rebuy_cooldown_minutes: i64,
    pub rebuy_mode: RebuyMode,
    /// Recompute the rebuy price every tick while armed
    pub rebuy_dynamic: bool,
    /// Hard USD ceiling on any rebuy order
    pub rebuy_max_usd: f64,
    /// Candles scanned for the confirmation support level
    pub rebuy_lookback: usize,

    pub trading_enabled: bool,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            fee: 0.001,
            slip: 0.0005,
            risk_per_trade: 0.01,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            bb_period: 20,
            bb_std: 2.0,
            atr_period: 14,
            crash_atr_mult: 3.0,
            crash_dd_pct: 0.05,
            crash_require_profit: true,
            crash_min_profit_pct: 0.0,
            rebuy_cooldown_minutes: 60,
            rebuy_mode: RebuyMode::Confirmation,
            rebuy_dynamic: true,
            rebuy_max_usd: 100.0,
            rebuy_lookback: 10,
            trading_enabled: true,
        }
    }
}

impl TradingParams {
    /// Reject values that would silently break sizing or signals
    pub fn validate(&self) -> Result<()> {
        check_fraction("fee", self.fee)?;
        check_fraction("slip", self.slip)?;
        check_open_fraction("risk_per_trade", self.risk_per_trade)?;
        check_open_fraction("stop_loss_pct", self.stop_loss_pct)?;
        check_non_negative("take_profit_pct", self.take_profit_pct)?;
        if self.take_profit_pct == 0.0 {
            return Err(EngineError::invalid("take_profit_pct", "must be > 0"));
        }

        if self.bb_period < 2 {
            return Err(EngineError::invalid("bb_period", "must be >= 2"));
        }
        check_non_negative("bb_std", self.bb_std)?;
        if self.atr_period == 0 {
            return Err(EngineError::invalid("atr_period", "must be >= 1"));
        }

        check_non_negative("crash_atr_mult", self.crash_atr_mult)?;
        check_fraction("crash_dd_pct", self.crash_dd_pct)?;
        check_non_negative("crash_min_profit_pct", self.crash_min_profit_pct)?;

        if self.rebuy_cooldown_minutes < 0 {
            return Err(EngineError::invalid("rebuy_cooldown_minutes", "must be >= 0"));
        }
        check_non_negative("rebuy_max_usd", self.rebuy_max_usd)?;
        if self.rebuy_lookback == 0 {
            return Err(EngineError::invalid("rebuy_lookback", "must be >= 1"));
        }

        Ok(())
    }

    /// Candles a trader must retain to evaluate every signal
    pub fn window_len(&self) -> usize {
        self.bb_period
            .max(self.atr_period + 1)
            .max(self.rebuy_lookback)
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::invalid(field, format!("must be >= 0, got {}", value)));
    }
    Ok(())
}

fn check_fraction(field: &str, value: f64) -> Result<()> {
    check_non_negative(field, value)?;
    if value >= 1.0 {
        return Err(EngineError::invalid(field, format!("must be < 1, got {}", value)));
    }
    Ok(())
}

fn check_open_fraction(field: &str, value: f64) -> Result<()> {
    check_fraction(field, value)?;
    if value == 0.0 {
        return Err(EngineError::invalid(field, "must be > 0"));
    }
    Ok(())
}

/// One traded pair, optionally overriding the default params
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolConfig {
    pub symbol: String,
    #[serde(default)]
    pub params: Option<TradingParams>,
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting notional equity per symbol (USD)
    pub initial_equity: f64,
    pub timeframe_minutes: u32,
    /// Startup delay between workers, multiplied by worker index
    pub stagger_ms: u64,
    /// How long `stop()` waits for each worker before aborting it
    pub stop_timeout_secs: u64,
    /// Shared rebuy ceiling, applied to every symbol
    pub rebuy_max_usd: f64,
    /// Historical bars requested from the feed before trading starts
    pub warmup_bars: usize,
    pub defaults: TradingParams,
    pub symbols: Vec<SymbolConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            timeframe_minutes: 5,
            stagger_ms: 250,
            stop_timeout_secs: 10,
            rebuy_max_usd: 100.0,
            warmup_bars: 50,
            defaults: TradingParams::default(),
            symbols: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional TOML file plus `REBUYBOT__*` environment overrides
    ///
    /// e.g. `REBUYBOT__DEFAULTS__REBUY_MODE=knife`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("REBUYBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(EngineError::invalid("initial_equity", "must be > 0"));
        }
        if self.timeframe_minutes == 0 {
            return Err(EngineError::invalid("timeframe_minutes", "must be >= 1"));
        }
        check_non_negative("rebuy_max_usd", self.rebuy_max_usd)?;
        if self.symbols.is_empty() {
            return Err(EngineError::invalid("symbols", "at least one symbol is required"));
        }

        let mut seen = HashSet::new();
        for entry in &self.symbols {
            if entry.symbol.trim().is_empty() {
                return Err(EngineError::invalid("symbols", "symbol name is empty"));
            }
            if !seen.insert(entry.symbol.as_str()) {
                return Err(EngineError::invalid(
                    "symbols",
                    format!("duplicate symbol {}", entry.symbol),
                ));
            }
        }

        self.defaults.validate()?;
        for (_, params) in self.resolved_params() {
            params.validate()?;
        }
        Ok(())
    }

    /// Effective params per symbol, with the shared rebuy ceiling applied
    pub fn resolved_params(&self) -> Vec<(String, TradingParams)> {
        self.symbols
            .iter()
            .map(|entry| {
                let mut params = entry
                    .params
                    .clone()
                    .unwrap_or_else(|| self.defaults.clone());
                params.rebuy_max_usd = self.rebuy_max_usd;
                (entry.symbol.clone(), params)
            })
            .collect()
    }
}
