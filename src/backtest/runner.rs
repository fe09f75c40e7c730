use crate::backtest::feed::HistoryFeed;
use crate::backtest::metrics::{BacktestMetrics, MetricsConfig};
use crate::engine::RecommendationEngine;
use crate::error::CoreError;
use crate::execution::{LedgerConfig, PositionLedger};
use crate::models::{Candle, EquityPoint, StrategyWeights, Timeframe, Trade};
use crate::strategy::signals::validate_candle_series;
use crate::strategy::StrategyRegistry;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(CoreError::invalid_config(format!(
                "backtest.initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        Ok(())
    }
}

/// Everything a backtest produces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub initial_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: BacktestMetrics,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.metrics.final_equity
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Backtest runner that replays the recommendation engine over history
///
/// Per run: one ledger, one equity curve, strictly sequential. The runner
/// itself is immutable and cheap to clone, so independent runs can share it.
#[derive(Debug, Clone)]
pub struct BacktestRunner {
    engine: Arc<RecommendationEngine>,
    ledger_config: LedgerConfig,
    metrics_config: MetricsConfig,
    initial_capital: f64,
}

impl BacktestRunner {
    pub fn new(
        engine: Arc<RecommendationEngine>,
        ledger_config: LedgerConfig,
        metrics_config: MetricsConfig,
        initial_capital: f64,
    ) -> Result<Self> {
        ledger_config.validate()?;
        BacktestConfig { initial_capital }.validate()?;

        Ok(Self {
            engine,
            ledger_config,
            metrics_config,
            initial_capital,
        })
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Run a backtest over `candles`
    ///
    /// The series is validated up front and then revealed one candle at a
    /// time. From the warm-up index on, each candle gets: stop/target check,
    /// evaluation on the history so far, ledger update at the close, and an
    /// equity point. Whatever is open after the last candle is force-closed.
    pub fn run(&self, candles: &[Candle]) -> Result<BacktestResult> {
        validate_candle_series(candles)?;

        let first = &candles[0];
        let warmup = self.engine.warmup_index();
        let mut ledger = PositionLedger::new(
            first.symbol.clone(),
            self.initial_capital,
            self.ledger_config.clone(),
        );
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::new();

        if candles.len() <= warmup {
            tracing::warn!(
                "Not enough candles for {} {}: have {}, strategies need {}; nothing evaluated",
                first.symbol,
                first.timeframe,
                candles.len(),
                warmup + 1
            );
            return Ok(self.finish(first, trades, equity_curve));
        }

        tracing::info!(
            "Starting backtest: {} {} candles of {}, warm-up until index {}",
            candles.len(),
            first.timeframe,
            first.symbol,
            warmup
        );

        for (index, history) in HistoryFeed::new(candles).skip(warmup) {
            let candle = &history[index];
            let ledger_error = |source| CoreError::Ledger { index, source };

            // Exits first, against this candle's range
            if let Some(trade) = ledger.check_exits(candle).map_err(ledger_error)? {
                trades.push(trade);
            }

            let recommendation = self.engine.evaluate(history, index)?;
            let closed = ledger
                .on_recommendation(&recommendation, candle)
                .map_err(ledger_error)?;
            trades.extend(closed);

            equity_curve.push(EquityPoint {
                timestamp: candle.open_time,
                equity: ledger.equity(candle.close),
            });
        }

        let last = &candles[candles.len() - 1];
        if let Some(trade) = ledger.force_close(last).map_err(|source| CoreError::Ledger {
            index: candles.len() - 1,
            source,
        })? {
            tracing::debug!("Force-closed trade #{} at series end", trade.id);
            trades.push(trade);
        }

        let result = self.finish(first, trades, equity_curve);
        tracing::info!(
            "Backtest complete: {} trades, return {:+.2}%, Sharpe {:.2}, max drawdown {:.2}%",
            result.metrics.total_trades,
            result.metrics.total_return,
            result.metrics.sharpe_ratio,
            result.metrics.max_drawdown
        );

        Ok(result)
    }

    fn finish(
        &self,
        first: &Candle,
        trades: Vec<Trade>,
        equity_curve: Vec<EquityPoint>,
    ) -> BacktestResult {
        let metrics = BacktestMetrics::summarize(
            &trades,
            &equity_curve,
            self.initial_capital,
            first.timeframe,
            &self.metrics_config,
        );

        BacktestResult {
            symbol: first.symbol.clone(),
            timeframe: first.timeframe,
            initial_capital: self.initial_capital,
            trades,
            equity_curve,
            metrics,
        }
    }

    /// Run backtest and print report
    pub fn run_and_report(&self, candles: &[Candle], scenario_name: &str) -> Result<BacktestResult> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Strategies: {}", self.engine.registry().ids().join(", "));
        println!("   Candles: {}", candles.len());
        println!("   Initial Capital: ${:.2}", self.initial_capital);

        let result = self.run(candles)?;
        result.metrics.print_report();

        Ok(result)
    }
}

/// One-shot backtest with default aggregation, ledger and metrics settings
pub fn run_backtest(
    candles: &[Candle],
    registry: StrategyRegistry,
    weights: StrategyWeights,
    initial_capital: f64,
) -> Result<BacktestResult> {
    let engine = RecommendationEngine::with_defaults(registry, weights)?;
    BacktestRunner::new(
        Arc::new(engine),
        LedgerConfig::default(),
        MetricsConfig::default(),
        initial_capital,
    )?
    .run(candles)
}
