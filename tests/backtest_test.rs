use chrono::{DateTime, Utc};
use decision_core::backtest::synthetic::candles_from_closes;
use decision_core::backtest::{
    BacktestResult, BacktestRunner, MarketScenario, MetricsConfig, SyntheticDataGenerator,
};
use decision_core::execution::{LedgerConfig, SizingPolicy};
use decision_core::strategy::{StrategiesConfig, StrategyError};
use decision_core::*;
use std::sync::{Arc, Mutex};

/// Emits a fixed action at chosen candle indices and HOLD/0 elsewhere
struct ScriptedStrategy {
    id: &'static str,
    script: Vec<(usize, Action, f64)>,
}

impl Strategy for ScriptedStrategy {
    fn evaluate(&self, window: &[Candle]) -> std::result::Result<Signal, StrategyError> {
        let index = window.len() - 1;
        Ok(self
            .script
            .iter()
            .find(|(at, _, _)| *at == index)
            .map(|(_, action, confidence)| Signal::new(self.id, *action, *confidence))
            .unwrap_or_else(|| Signal::new(self.id, Action::Hold, 0.0)))
    }

    fn id(&self) -> &str {
        self.id
    }

    fn min_candles_required(&self) -> usize {
        1
    }
}

/// Records every window it is shown
struct RecordingStrategy {
    seen: Mutex<Vec<(usize, DateTime<Utc>)>>,
}

impl Strategy for RecordingStrategy {
    fn evaluate(&self, window: &[Candle]) -> std::result::Result<Signal, StrategyError> {
        let last = window.last().ok_or_else(|| StrategyError::new("empty window"))?;
        self.seen.lock().unwrap().push((window.len(), last.open_time));
        Ok(Signal::new("recorder", Action::Hold, 0.5))
    }

    fn id(&self) -> &str {
        "recorder"
    }

    fn min_candles_required(&self) -> usize {
        5
    }
}

fn exact_ledger() -> LedgerConfig {
    LedgerConfig {
        commission_rate: 0.0,
        sizing: SizingPolicy::FixedQuantity { quantity: 1.0 },
        allow_short: false,
    }
}

fn runner_for(strategies: Vec<Arc<dyn Strategy>>, ledger: LedgerConfig) -> BacktestRunner {
    let mut registry = StrategyRegistry::new();
    for strategy in strategies {
        registry.register(strategy).unwrap();
    }
    let engine = RecommendationEngine::with_defaults(registry, StrategyWeights::new()).unwrap();
    BacktestRunner::new(Arc::new(engine), ledger, MetricsConfig::default(), 10_000.0).unwrap()
}

fn configured_runner(allow_short: bool) -> BacktestRunner {
    let mut config = AppConfig::default();
    config.ledger.allow_short = allow_short;
    let engine = RecommendationEngine::from_config(&config).unwrap();
    BacktestRunner::new(
        Arc::new(engine),
        config.ledger.clone(),
        config.metrics.clone(),
        config.backtest.initial_capital,
    )
    .unwrap()
}

#[test]
fn test_runner_never_reveals_future_candles() {
    let recorder = Arc::new(RecordingStrategy {
        seen: Mutex::new(Vec::new()),
    });
    let runner = runner_for(vec![recorder.clone()], exact_ledger());
    let candles = SyntheticDataGenerator::new(5).generate(MarketScenario::Volatile, 120);

    let result = runner.run(&candles).unwrap();
    let seen = recorder.seen.lock().unwrap();

    // Warm-up index is 4: one evaluation per candle from there on
    assert_eq!(seen.len(), 116);
    assert_eq!(seen.len(), result.equity_curve.len());
    for (k, ((len, last_time), point)) in seen.iter().zip(&result.equity_curve).enumerate() {
        let index = k + 4;
        assert_eq!(*len, index + 1, "window at {} has {} candles", index, len);
        assert_eq!(*last_time, candles[index].open_time);
        assert_eq!(point.timestamp, candles[index].open_time);
    }
}

#[test]
fn test_windows_stay_bounded_on_long_series() {
    let recorder = Arc::new(RecordingStrategy {
        seen: Mutex::new(Vec::new()),
    });
    let mut registry = StrategyRegistry::new();
    registry.register(recorder.clone()).unwrap();
    let engine = RecommendationEngine::with_defaults(registry, StrategyWeights::new())
        .unwrap()
        .with_max_window(50)
        .unwrap();
    let runner =
        BacktestRunner::new(Arc::new(engine), exact_ledger(), MetricsConfig::default(), 10_000.0)
            .unwrap();
    let candles = SyntheticDataGenerator::new(9).generate(MarketScenario::Sideways, 400);

    runner.run(&candles).unwrap();
    let seen = recorder.seen.lock().unwrap();

    assert_eq!(seen.len(), 396);
    for (k, (len, last_time)) in seen.iter().enumerate() {
        let index = k + 4;
        assert_eq!(*len, (index + 1).min(50));
        assert_eq!(*last_time, candles[index].open_time);
    }
}

#[test]
fn test_blown_up_short_finishes_flat() {
    let script = ScriptedStrategy {
        id: "script",
        script: vec![(0, Action::Sell, 0.9), (2, Action::Buy, 0.9)],
    };
    let ledger = LedgerConfig {
        commission_rate: 0.001,
        sizing: SizingPolicy::FixedFraction { fraction: 0.95 },
        allow_short: true,
    };
    let runner = runner_for(vec![Arc::new(script)], ledger);
    let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 180.0, 250.0, 260.0]);

    let result = runner.run(&candles).unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::Reversal);
    assert!(result.final_equity() < 0.0);
    assert_eq!(result.metrics.max_drawdown, 100.0);
    let drift = (result.final_equity() - result.initial_capital) - result.realized_pnl();
    assert!(drift.abs() < 1e-6);
}

#[test]
fn test_identical_runs_are_identical() {
    let candles = SyntheticDataGenerator::new(77).generate(MarketScenario::Volatile, 600);

    let a = configured_runner(true).run(&candles).unwrap();
    let b = configured_runner(true).run(&candles).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_equity_reconciles_with_realized_pnl() {
    for scenario in MarketScenario::ALL {
        for allow_short in [false, true] {
            let candles = SyntheticDataGenerator::new(21).generate(scenario, 400);
            let result = configured_runner(allow_short).run(&candles).unwrap();

            let drift = (result.final_equity() - result.initial_capital) - result.realized_pnl();
            assert!(
                drift.abs() < 1e-6,
                "{} (shorts {}): equity drifted by {}",
                scenario.name(),
                allow_short,
                drift
            );
            assert!(result.trades.iter().all(|t| t.quantity > 0.0));
            assert!((0.0..=100.0).contains(&result.metrics.max_drawdown));
            assert!((0.0..=100.0).contains(&result.metrics.win_rate));
            assert!(result.metrics.sharpe_ratio.is_finite());
        }
    }
}

#[test]
fn test_buy_then_sell_closes_one_trade() {
    let script = ScriptedStrategy {
        id: "script",
        script: vec![(2, Action::Buy, 0.9), (4, Action::Sell, 0.9)],
    };
    let runner = runner_for(vec![Arc::new(script)], exact_ledger());
    let closes = [100.0, 101.0, 102.0, 103.0, 106.0, 104.0];
    let candles = candles_from_closes("SOL", Timeframe::H1, &closes);

    let result = runner.run(&candles).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_price, 102.0);
    assert_eq!(trade.exit_price, 106.0);
    assert_eq!(trade.entry_timestamp, candles[2].open_time);
    assert_eq!(trade.exit_timestamp, candles[4].open_time);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_eq!(trade.pnl, 4.0);
    // Flat afterwards: the last equity point carries no open exposure
    assert_eq!(result.equity_curve.last().unwrap().equity, 10_004.0);
}

#[test]
fn test_open_position_is_force_closed_and_counted() {
    let script = ScriptedStrategy {
        id: "script",
        script: vec![(3, Action::Buy, 0.7)],
    };
    let runner = runner_for(vec![Arc::new(script)], exact_ledger());
    let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 100.0, 100.0, 100.0, 103.0, 105.0]);

    let result = runner.run(&candles).unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::ForcedClose);
    assert_eq!(result.trades[0].exit_price, 105.0);
    assert_eq!(result.metrics.total_trades, 1);
    assert_eq!(result.metrics.win_rate, 100.0);
    assert_eq!(result.metrics.forced_closes, 1);
}

#[test]
fn test_weighted_vote_through_engine() {
    let registry = StrategyRegistry::new()
        .with(Arc::new(ScriptedStrategy {
            id: "a",
            script: vec![(0, Action::Buy, 0.9)],
        }))
        .and_then(|r| {
            r.with(Arc::new(ScriptedStrategy {
                id: "b",
                script: vec![(0, Action::Sell, 0.2)],
            }))
        })
        .and_then(|r| {
            r.with(Arc::new(ScriptedStrategy {
                id: "c",
                script: vec![(0, Action::Hold, 0.1)],
            }))
        })
        .unwrap();
    let weights = StrategyWeights::new()
        .with("a", 0.25)
        .with("b", 0.35)
        .with("c", 0.40);
    let engine = RecommendationEngine::with_defaults(registry, weights).unwrap();

    let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0]);
    let rec = engine.recommend(&candles).unwrap();

    assert_eq!(rec.action, Action::Buy);
    assert!((rec.confidence - 0.225).abs() < 1e-12);
}

#[test]
fn test_mixed_series_rejected_before_evaluation() {
    let recorder = Arc::new(RecordingStrategy {
        seen: Mutex::new(Vec::new()),
    });
    let runner = runner_for(vec![recorder.clone()], exact_ledger());
    let mut candles = candles_from_closes("SOL", Timeframe::H1, &[100.0; 10]);
    candles[8].open_time = candles[7].open_time;

    let err = runner.run(&candles).unwrap_err();
    assert!(matches!(err, CoreError::DataIntegrity { index: 8, .. }));
    assert!(recorder.seen.lock().unwrap().is_empty());
}

#[test]
fn test_result_survives_json() {
    let candles = SyntheticDataGenerator::new(8).generate(MarketScenario::Crash, 300);
    let result = configured_runner(false).run(&candles).unwrap();

    let json = serde_json::to_string(&result).unwrap();
    let back: BacktestResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn test_default_strategies_cover_registry() {
    let registry = StrategyRegistry::from_config(&StrategiesConfig::default()).unwrap();
    assert_eq!(registry.len(), 3);
}
