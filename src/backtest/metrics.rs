use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Trade, TradeSide, TradeType};

/// One completed round trip (entry fill matched with its exit fill)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_type: TradeType,
    pub exit_type: TradeType,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net of fees
    pub pnl: f64,
    pub pnl_pct: f64,
    pub fees: f64,
    pub holding_period_minutes: i64,
}

impl TradeRecord {
    /// Pair each buy with the sell that follows it
    pub fn pair(trades: &[Trade]) -> Vec<Self> {
        let mut records = Vec::new();
        let mut open: Option<&Trade> = None;

        for trade in trades {
            match trade.side {
                TradeSide::Buy => open = Some(trade),
                TradeSide::Sell => {
                    let Some(entry) = open.take() else {
                        continue;
                    };
                    let pnl_pct = if entry.price > 0.0 {
                        (trade.price - entry.price) / entry.price * 100.0
                    } else {
                        0.0
                    };

                    records.push(Self {
                        entry_time: entry.time,
                        exit_time: trade.time,
                        entry_type: entry.trade_type,
                        exit_type: trade.trade_type,
                        entry_price: entry.price,
                        exit_price: trade.price,
                        quantity: trade.quantity,
                        pnl: trade.pnl,
                        pnl_pct,
                        fees: trade.fees,
                        holding_period_minutes: (trade.time - entry.time).num_minutes(),
                    });
                }
            }
        }

        records
    }
}

/// Performance summary of one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L
    pub initial_equity: f64,
    pub final_equity: f64,
    pub net_pnl: f64,
    pub total_return_pct: f64,
    pub total_fees: f64,

    // Round trips
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub avg_holding_period_minutes: f64,

    // Per trade type
    pub baseline_entries: usize,
    pub confirmation_rebuys: usize,
    pub knife_rebuys: usize,
    pub normal_exits: usize,
    pub crash_exits: usize,
    pub capped_rebuys: usize,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    /// Summarize a trade log. `final_equity` is the trader's realized equity.
    pub fn from_trades(trades: &[Trade], initial_equity: f64, final_equity: f64) -> Self {
        let records = TradeRecord::pair(trades);
        let count = |kind: TradeType| trades.iter().filter(|t| t.trade_type == kind).count();

        let winners: Vec<f64> = records.iter().map(|r| r.pnl).filter(|p| *p > 0.0).collect();
        let losers: Vec<f64> = records.iter().map(|r| r.pnl).filter(|p| *p <= 0.0).collect();

        let total_wins: f64 = winners.iter().sum();
        let total_losses: f64 = losers.iter().map(|p| p.abs()).sum();

        let round_trips = records.len();
        let win_rate = if round_trips > 0 {
            winners.len() as f64 / round_trips as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(trades, initial_equity);

        let avg_holding_period_minutes = if round_trips > 0 {
            records
                .iter()
                .map(|r| r.holding_period_minutes)
                .sum::<i64>() as f64
                / round_trips as f64
        } else {
            0.0
        };

        Self {
            initial_equity,
            final_equity,
            net_pnl: final_equity - initial_equity,
            total_return_pct: if initial_equity > 0.0 {
                (final_equity - initial_equity) / initial_equity * 100.0
            } else {
                0.0
            },
            total_fees: trades.iter().map(|t| t.fees).sum(),
            round_trips,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            avg_win: mean(&winners),
            avg_loss: if losers.is_empty() {
                0.0
            } else {
                total_losses / losers.len() as f64
            },
            largest_win: winners.iter().copied().fold(0.0, f64::max),
            largest_loss: losers.iter().copied().fold(0.0, f64::min),
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio: Self::calculate_sharpe_ratio(&records),
            avg_holding_period_minutes,
            baseline_entries: count(TradeType::BaselineEntry),
            confirmation_rebuys: count(TradeType::RebuyConfirmation),
            knife_rebuys: count(TradeType::RebuyKnife),
            normal_exits: count(TradeType::NormalExit),
            crash_exits: count(TradeType::CrashExit),
            capped_rebuys: trades.iter().filter(|t| t.capped).count(),
            trades: records,
        }
    }

    /// Max peak-to-trough drop of the realized equity curve
    fn calculate_drawdown(trades: &[Trade], initial_equity: f64) -> (f64, f64) {
        let mut peak = initial_equity;
        let mut max_dd = 0.0_f64;
        let mut max_dd_pct = 0.0_f64;

        for trade in trades.iter().filter(|t| t.side == TradeSide::Sell) {
            peak = peak.max(trade.equity);
            let drawdown = peak - trade.equity;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Per-trade Sharpe, risk-free rate 0
    fn calculate_sharpe_ratio(records: &[TradeRecord]) -> f64 {
        if records.is_empty() {
            return 0.0;
        }

        let returns: Vec<f64> = records.iter().map(|r| r.pnl_pct).collect();
        let mean_return = mean(&returns);
        let variance = returns
            .iter()
            .map(|r| (r - mean_return).powi(2))
            .sum::<f64>()
            / returns.len() as f64;

        let std_dev = variance.sqrt();
        if std_dev > 0.0 {
            mean_return / std_dev
        } else {
            0.0
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self, title: &str) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║  {:<53}║", title);
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Equity:        ${:.2}", self.initial_equity);
        println!("  Final Equity:          ${:.2}", self.final_equity);
        println!(
            "  Net P&L:               ${:.2} ({:+.2}%)",
            self.net_pnl, self.total_return_pct
        );
        println!("  Fees Paid:             ${:.2}", self.total_fees);

        println!("\n📈 ROUND TRIPS");
        println!("  Completed:             {}", self.round_trips);
        println!(
            "  Winning:               {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing:                {}", self.losing_trades);

        if self.round_trips > 0 {
            println!("  Average Win:           ${:.2}", self.avg_win);
            println!("  Average Loss:          ${:.2}", self.avg_loss);
            println!("  Largest Win:           ${:.2}", self.largest_win);
            println!("  Largest Loss:          ${:.2}", self.largest_loss);
            println!("  Profit Factor:         {:.2}", self.profit_factor);

            println!("\n⚠️  RISK");
            println!(
                "  Max Drawdown:          ${:.2} ({:.2}%)",
                self.max_drawdown, self.max_drawdown_pct
            );
            println!("  Sharpe Ratio:          {:.2}", self.sharpe_ratio);
            println!(
                "  Avg Holding:           {:.1} minutes",
                self.avg_holding_period_minutes
            );
        }

        println!("\n🔁 TRADE TYPES");
        println!("  Baseline Entries:      {}", self.baseline_entries);
        println!(
            "  Rebuys:                {} confirmation / {} knife ({} capped)",
            self.confirmation_rebuys, self.knife_rebuys, self.capped_rebuys
        );
        println!(
            "  Exits:                 {} normal / {} crash",
            self.normal_exits, self.crash_exits
        );
        println!();
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
