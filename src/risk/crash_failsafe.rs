use serde::{Deserialize, Serialize};

use crate::config::TradingParams;

/// Which drawdown condition tripped the failsafe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrashTrigger {
    /// Drop from peak >= crash_atr_mult * ATR
    AtrDrop,
    /// Drop from peak >= crash_dd_pct of the peak
    Drawdown,
}

/// Outcome of one failsafe evaluation, kept for logging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrashCheck {
    pub drop: f64,
    pub drop_pct: f64,
    pub atr_threshold: Option<f64>,
    pub in_profit: bool,
    pub trigger: Option<CrashTrigger>,
}

impl CrashCheck {
    fn quiet() -> Self {
        Self {
            drop: 0.0,
            drop_pct: 0.0,
            atr_threshold: None,
            in_profit: false,
            trigger: None,
        }
    }

    pub fn fires(&self) -> bool {
        self.in_profit && self.trigger.is_some()
    }
}

/// Emergency exit on drawdown from the post-entry peak
///
/// The entry-relative stop only fires once price falls back below entry; this
/// measures from the highest high since entry so a reversal gives back at most
/// `crash_dd_pct` (or `crash_atr_mult` ATRs) of the run-up. A zero threshold
/// disables that leg.
#[derive(Debug, Clone)]
pub struct CrashFailsafe {
    fee: f64,
    slip: f64,
    atr_mult: f64,
    dd_pct: f64,
    require_profit: bool,
    min_profit_pct: f64,
}

impl CrashFailsafe {
    pub fn from_params(params: &TradingParams) -> Self {
        Self {
            fee: params.fee,
            slip: params.slip,
            atr_mult: params.crash_atr_mult,
            dd_pct: params.crash_dd_pct,
            require_profit: params.crash_require_profit,
            min_profit_pct: params.crash_min_profit_pct,
        }
    }

    /// Close must clear entry by this multiple to count as "in profit"
    pub fn breakeven_mult(&self) -> f64 {
        1.0 + 2.0 * self.fee + 2.0 * self.slip + self.min_profit_pct
    }

    pub fn evaluate(
        &self,
        entry_price: f64,
        peak: f64,
        close: f64,
        low: f64,
        atr: Option<f64>,
    ) -> CrashCheck {
        if peak <= 0.0 || entry_price <= 0.0 {
            return CrashCheck::quiet();
        }

        let drop = (peak - close).max(peak - low);
        let drop_pct = drop / peak;

        let in_profit = if self.require_profit {
            close >= entry_price * self.breakeven_mult()
        } else {
            true
        };

        let atr_threshold = atr
            .filter(|a| a.is_finite() && *a > 0.0)
            .map(|a| self.atr_mult * a)
            .filter(|t| *t > 0.0);

        let trigger = if atr_threshold.is_some_and(|t| drop >= t) {
            Some(CrashTrigger::AtrDrop)
        } else if self.dd_pct > 0.0 && drop_pct >= self.dd_pct {
            Some(CrashTrigger::Drawdown)
        } else {
            None
        };

        CrashCheck {
            drop,
            drop_pct,
            atr_threshold,
            in_profit,
            trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failsafe(require_profit: bool) -> CrashFailsafe {
        CrashFailsafe::from_params(&TradingParams {
            fee: 0.0,
            slip: 0.0,
            crash_atr_mult: 3.0,
            crash_dd_pct: 0.05,
            crash_require_profit: require_profit,
            crash_min_profit_pct: 0.0,
            ..TradingParams::default()
        })
    }

    #[test]
    fn test_fires_on_large_drop_from_peak() {
        // entry 100, peak 130, ATR 2 => ATR threshold 6, pct threshold 6.5
        let check = failsafe(true).evaluate(100.0, 130.0, 120.0, 120.0, Some(2.0));

        assert_eq!(check.drop, 10.0);
        assert!(check.drop_pct > 0.076 && check.drop_pct < 0.077);
        assert_eq!(check.atr_threshold, Some(6.0));
        assert!(check.in_profit);
        assert!(check.fires());
    }

    #[test]
    fn test_quiet_on_small_drop() {
        let check = failsafe(true).evaluate(100.0, 130.0, 125.0, 125.0, Some(2.0));

        assert_eq!(check.drop, 5.0);
        assert!(check.trigger.is_none());
        assert!(!check.fires());
    }

    #[test]
    fn test_intrabar_low_counts_as_drop() {
        // close recovered to 125 but the wick went to 123 => drop 7 >= 6
        let check = failsafe(true).evaluate(100.0, 130.0, 125.0, 123.0, Some(2.0));
        assert_eq!(check.trigger, Some(CrashTrigger::AtrDrop));
        assert!(check.fires());
    }

    #[test]
    fn test_percentage_leg_without_atr() {
        let check = failsafe(true).evaluate(100.0, 130.0, 120.0, 120.0, None);
        assert_eq!(check.trigger, Some(CrashTrigger::Drawdown));
        assert!(check.fires());
    }

    #[test]
    fn test_profit_gate_blocks_exit_below_breakeven() {
        let guard = CrashFailsafe::from_params(&TradingParams {
            fee: 0.001,
            slip: 0.001,
            crash_dd_pct: 0.05,
            crash_require_profit: true,
            ..TradingParams::default()
        });

        // Breakeven is 100 * 1.004 = 100.4; close 100.2 is a huge drop from 130
        let check = guard.evaluate(100.0, 130.0, 100.2, 100.0, Some(2.0));
        assert!(check.trigger.is_some());
        assert!(!check.in_profit);
        assert!(!check.fires());
    }

    #[test]
    fn test_profit_gate_disabled() {
        let check = failsafe(false).evaluate(100.0, 130.0, 95.0, 95.0, Some(2.0));
        assert!(check.in_profit);
        assert!(check.fires());
    }

    #[test]
    fn test_min_profit_raises_breakeven() {
        let guard = CrashFailsafe::from_params(&TradingParams {
            fee: 0.001,
            slip: 0.0005,
            crash_min_profit_pct: 0.01,
            ..TradingParams::default()
        });
        assert!((guard.breakeven_mult() - 1.013).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_peak_never_triggers() {
        let check = failsafe(false).evaluate(100.0, 0.0, 50.0, 40.0, Some(2.0));
        assert!(!check.fires());

        let check = failsafe(false).evaluate(100.0, -5.0, 50.0, 40.0, Some(2.0));
        assert!(!check.fires());
    }

    #[test]
    fn test_zero_atr_does_not_trigger_on_flat_tick() {
        let check = failsafe(false).evaluate(100.0, 100.0, 100.0, 100.0, Some(0.0));
        assert!(check.trigger.is_none());
    }
}
