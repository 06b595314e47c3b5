use rebuybot::backtest::{BacktestMetrics, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use rebuybot::strategy::RebuyMode;
use rebuybot::{Result, TradingParams};

const SEED: u64 = 42;
const CANDLES: usize = 2_000;
const INTERVAL_MINUTES: i64 = 5;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("rebuybot=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║           REBUYBOT BACKTESTING SUITE                  ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let runner = BacktestRunner::new(10_000.0);

    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend"),
        (MarketScenario::Downtrend, "📉 Downtrend"),
        (MarketScenario::Sideways, "↔️  Sideways"),
        (MarketScenario::Volatile, "⚡ Volatile"),
        (MarketScenario::FlashCrash, "💥 Flash crash"),
    ];

    let mut all_metrics = Vec::new();

    for (scenario, name) in scenarios {
        for mode in [RebuyMode::Confirmation, RebuyMode::Knife] {
            let mut generator = SyntheticDataGenerator::new(SEED);
            let candles = generator.generate(scenario, CANDLES, INTERVAL_MINUTES);

            let params = TradingParams {
                rebuy_mode: mode,
                ..TradingParams::default()
            };

            let label = format!("{} / {}", name, mode);
            match runner.run("SYNTH", params, candles) {
                Ok(report) => {
                    report.metrics.print_report(&label);
                    all_metrics.push((label, report.metrics));
                }
                Err(e) => {
                    eprintln!("❌ Backtest failed for {}: {}", label, e);
                }
            }
        }
    }

    print_summary_comparison(&all_metrics);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestMetrics)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<32} {:>7} {:>9} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "Scenario", "Trips", "Return", "WinRt", "PF", "MaxDD", "Crash", "Rebuy"
    );
    println!("{}", "─".repeat(92));

    for (name, m) in results {
        println!(
            "{:<32} {:>7} {:>8.2}% {:>6.1}% {:>7.2} {:>6.2}% {:>7} {:>7}",
            name,
            m.round_trips,
            m.total_return_pct,
            m.win_rate,
            m.profit_factor,
            m.max_drawdown_pct,
            m.crash_exits,
            m.confirmation_rebuys + m.knife_rebuys
        );
    }

    println!();
}
