use crate::models::{EquityPoint, ExitReason, Timeframe, Trade};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit for reported trade durations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
}

impl DurationUnit {
    pub fn convert(&self, duration: Duration) -> f64 {
        let seconds = duration.num_milliseconds() as f64 / 1000.0;
        match self {
            DurationUnit::Seconds => seconds,
            DurationUnit::Minutes => seconds / 60.0,
            DurationUnit::Hours => seconds / 3600.0,
            DurationUnit::Days => seconds / 86_400.0,
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationUnit::Seconds => f.write_str("seconds"),
            DurationUnit::Minutes => f.write_str("minutes"),
            DurationUnit::Hours => f.write_str("hours"),
            DurationUnit::Days => f.write_str("days"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Periods per year for the Sharpe ratio; derived from the timeframe when unset
    pub annualization_factor: Option<f64>,
    pub duration_unit: DurationUnit,
}

impl MetricsConfig {
    pub fn annualization_for(&self, timeframe: Timeframe) -> f64 {
        self.annualization_factor
            .unwrap_or_else(|| timeframe.periods_per_year())
    }
}

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestMetrics {
    // Headline
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub avg_trade_duration: f64,
    pub duration_unit: DurationUnit,

    // Equity
    pub initial_capital: f64,
    pub final_equity: f64,
    pub max_drawdown_value: f64,

    // Trade statistics
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub forced_closes: usize,

    // P&L distribution
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub total_commission: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    /// Gross wins over gross losses; None when nothing was lost
    pub profit_factor: Option<f64>,
}

/// (final - initial) / initial × 100; final is initial for an empty curve
pub fn total_return_pct(equity_curve: &[EquityPoint], initial_capital: f64) -> f64 {
    if initial_capital == 0.0 {
        return 0.0;
    }
    let final_equity = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(initial_capital);
    (final_equity - initial_capital) / initial_capital * 100.0
}

/// Profitable share of trades in percent
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_profitable).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Largest peak-to-trough decline as (absolute, percent of peak)
///
/// Single left-to-right pass with the peak seeded at the initial capital.
/// The percentage is clamped to [0, 100].
pub fn max_drawdown(equity_curve: &[EquityPoint], initial_capital: f64) -> (f64, f64) {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }

        let drawdown = peak - point.equity;
        max_dd = max_dd.max(drawdown);
        if peak > 0.0 {
            max_dd_pct = max_dd_pct.max(drawdown / peak * 100.0);
        }
    }

    (max_dd, max_dd_pct.clamp(0.0, 100.0))
}

/// Period-over-period returns of the curve, the first measured from initial capital
pub fn period_returns(equity_curve: &[EquityPoint], initial_capital: f64) -> Vec<f64> {
    let mut previous = initial_capital;
    let mut returns = Vec::with_capacity(equity_curve.len());
    for point in equity_curve {
        if previous != 0.0 {
            returns.push((point.equity - previous) / previous);
        }
        previous = point.equity;
    }
    returns
}

/// Annualized Sharpe ratio with a zero risk-free rate
///
/// 0 with fewer than two returns, with zero dispersion, or when the result
/// would not be finite.
pub fn sharpe_ratio(returns: &[f64], annualization_factor: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    let sharpe = mean / std_dev * annualization_factor.sqrt();
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Mean holding time in `unit`; 0 with no trades
pub fn avg_trade_duration(trades: &[Trade], unit: DurationUnit) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| unit.convert(t.duration())).sum::<f64>() / trades.len() as f64
}

impl BacktestMetrics {
    /// Reduce trades and equity curve into performance statistics
    pub fn summarize(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        timeframe: Timeframe,
        config: &MetricsConfig,
    ) -> Self {
        let returns = period_returns(equity_curve, initial_capital);
        let (max_drawdown_value, max_drawdown_pct) = max_drawdown(equity_curve, initial_capital);

        let winners: Vec<f64> = trades.iter().filter(|t| t.is_profitable).map(|t| t.pnl).collect();
        let losers: Vec<f64> = trades.iter().filter(|t| !t.is_profitable).map(|t| t.pnl).collect();

        let total_wins: f64 = winners.iter().sum();
        let total_losses: f64 = losers.iter().map(|pnl| pnl.abs()).sum();

        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        let net_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let total_commission: f64 = trades.iter().map(|t| t.commission).sum();

        let (best_trade, worst_trade) = if trades.is_empty() {
            (0.0, 0.0)
        } else {
            let pnls = trades.iter().map(|t| t.pnl);
            (
                pnls.clone().fold(f64::NEG_INFINITY, f64::max),
                pnls.fold(f64::INFINITY, f64::min),
            )
        };

        let profit_factor = if total_losses > 0.0 {
            Some(total_wins / total_losses)
        } else {
            None
        };

        Self {
            total_return: total_return_pct(equity_curve, initial_capital),
            sharpe_ratio: sharpe_ratio(&returns, config.annualization_for(timeframe)),
            max_drawdown: max_drawdown_pct,
            win_rate: win_rate(trades),
            total_trades: trades.len(),
            avg_trade_duration: avg_trade_duration(trades, config.duration_unit),
            duration_unit: config.duration_unit,
            initial_capital,
            final_equity: equity_curve
                .last()
                .map(|p| p.equity)
                .unwrap_or(initial_capital),
            max_drawdown_value,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            forced_closes: trades
                .iter()
                .filter(|t| t.exit_reason == ExitReason::ForcedClose)
                .count(),
            gross_pnl: net_pnl + total_commission,
            net_pnl,
            total_commission,
            avg_win: mean(&winners),
            avg_loss: mean(&losers),
            best_trade,
            worst_trade,
            profit_factor,
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!("  Initial Capital:       ${:.2}", self.initial_capital);
        println!("  Final Equity:          ${:.2}", self.final_equity);
        println!("  Total Return:          {:+.2}%", self.total_return);
        println!("  Gross P&L:             ${:.2}", self.gross_pnl);
        println!("  Commission:            ${:.2}", self.total_commission);
        println!("  Net P&L:               ${:.2}", self.net_pnl);

        println!("\n📈 TRADE STATISTICS");
        println!("  Total Trades:          {}", self.total_trades);
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing Trades:         {}", self.losing_trades);
        println!("  Forced Closes:         {}", self.forced_closes);

        if self.total_trades > 0 {
            println!("\n💰 WIN/LOSS ANALYSIS");
            println!("  Average Win:           ${:.2}", self.avg_win);
            println!("  Average Loss:          ${:.2}", self.avg_loss);
            println!("  Best Trade:            ${:.2}", self.best_trade);
            println!("  Worst Trade:           ${:.2}", self.worst_trade);
            match self.profit_factor {
                Some(pf) => println!("  Profit Factor:         {:.2}", pf),
                None => println!("  Profit Factor:         n/a (no losses)"),
            }
            println!(
                "  Avg Duration:          {:.2} {}",
                self.avg_trade_duration, self.duration_unit
            );
        }

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown_value, self.max_drawdown
        );
        println!("  Sharpe Ratio:          {:.2}", self.sharpe_ratio);

        println!("\n═════════════════════════════════════════════════════════\n");
    }
}
