// Recommendation engine: strategies + weights + aggregation, shared by live and backtest
use crate::aggregator::{AggregatorConfig, EvaluationContext, SignalAggregator};
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::indicators::calculate_atr;
use crate::models::{Candle, Recommendation, Signal, StrategyWeights};
use crate::regime::{MarketConditionClassifier, RegimeConfig};
use crate::strategy::signals::validate_candle_series;
use crate::strategy::StrategyRegistry;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Trailing candles handed to strategies and the classifier per evaluation
    ///
    /// Raised automatically to the longest look-back in use. EMA and ATR seed
    /// from the first candle of the window, so a fixed length keeps backtest
    /// and live evaluations identical for the same trailing candles.
    pub max_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_window: 250 }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_window == 0 {
            return Err(CoreError::invalid_config("engine.max_window must be positive"));
        }
        Ok(())
    }
}

/// Turns a causal candle window into a recommendation
///
/// Holds no mutable state, so one engine can be shared by any number of runs.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    registry: StrategyRegistry,
    weights: StrategyWeights,
    aggregator: SignalAggregator,
    classifier: MarketConditionClassifier,
    max_window: usize,
}

impl RecommendationEngine {
    pub fn new(
        registry: StrategyRegistry,
        weights: StrategyWeights,
        aggregator: AggregatorConfig,
        regime: RegimeConfig,
    ) -> Result<Self> {
        aggregator.validate()?;
        regime.validate().map_err(CoreError::invalid_config)?;
        if let Some((strategy, weight)) = weights.first_invalid() {
            return Err(CoreError::invalid_config(format!(
                "weight for strategy '{}' must be finite and non-negative, got {}",
                strategy, weight
            )));
        }
        if registry.is_empty() {
            tracing::warn!("No strategies registered, every recommendation will be HOLD");
        }
        for (strategy, _) in weights.iter() {
            if registry.get(strategy).is_none() {
                tracing::warn!("Weight configured for unregistered strategy '{}'", strategy);
            }
        }

        Ok(Self {
            registry,
            weights,
            aggregator: SignalAggregator::new(aggregator),
            classifier: MarketConditionClassifier::new(regime),
            max_window: EngineConfig::default().max_window,
        })
    }

    /// Engine with default aggregation and regime settings
    pub fn with_defaults(registry: StrategyRegistry, weights: StrategyWeights) -> Result<Self> {
        Self::new(
            registry,
            weights,
            AggregatorConfig::default(),
            RegimeConfig::default(),
        )
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = StrategyRegistry::from_config(&config.strategies)?;
        Self::new(
            registry,
            config.weights.clone(),
            config.aggregator.clone(),
            config.regime.clone(),
        )?
        .with_max_window(config.engine.max_window)
    }

    /// Cap on the trailing candles read per evaluation
    pub fn with_max_window(mut self, max_window: usize) -> Result<Self> {
        EngineConfig { max_window }.validate()?;
        self.max_window = max_window;
        Ok(self)
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn weights(&self) -> &StrategyWeights {
        &self.weights
    }

    /// Same engine with different weights
    pub fn with_weights(&self, weights: StrategyWeights) -> Result<Self> {
        Self::new(
            self.registry.clone(),
            weights,
            self.aggregator.config().clone(),
            self.classifier.config().clone(),
        )?
        .with_max_window(self.max_window)
    }

    /// Index of the first candle at which every strategy has enough history
    pub fn warmup_index(&self) -> usize {
        self.registry.max_lookback().saturating_sub(1)
    }

    /// Trailing candles read per evaluation: the configured cap, but never
    /// shorter than any strategy's or the classifier's look-back
    pub fn window_len(&self) -> usize {
        self.max_window
            .max(self.registry.max_lookback())
            .max(self.classifier.config().min_window())
    }

    /// Evaluate every strategy on the tail of `history` and fuse the signals
    ///
    /// `history` must end at the candle being evaluated; only its trailing
    /// `window_len()` candles are read. `index` is that candle's position in
    /// the full series and only labels errors.
    pub fn evaluate(&self, history: &[Candle], index: usize) -> Result<Recommendation> {
        let window = &history[history.len().saturating_sub(self.window_len())..];
        let last = window
            .last()
            .ok_or_else(|| CoreError::data_integrity(index, "evaluation window is empty"))?;

        let signals = self
            .registry
            .iter()
            .map(|strategy| {
                strategy.evaluate(window).map_err(|e| CoreError::Strategy {
                    strategy: strategy.id().to_string(),
                    index,
                    reason: e.reason,
                })
            })
            .collect::<Result<Vec<Signal>>>()?;

        let ctx = EvaluationContext {
            symbol: last.symbol.clone(),
            timeframe: last.timeframe,
            timestamp: last.open_time,
            close: last.close,
            atr: calculate_atr(window, self.classifier.config().atr_period),
            market_conditions: self.classifier.classify(window),
        };

        self.aggregator.aggregate(&signals, &self.weights, &ctx)
    }

    /// Live mode: validate the series and recommend for its latest candle
    pub fn recommend(&self, candles: &[Candle]) -> Result<Recommendation> {
        validate_candle_series(candles)?;
        let index = candles.len() - 1;
        let recommendation = self.evaluate(candles, index)?;

        tracing::info!(
            "{} {} @ {}: {} ({:.1}% confidence)",
            recommendation.symbol,
            recommendation.timeframe,
            recommendation.timestamp,
            recommendation.action,
            recommendation.confidence * 100.0
        );

        Ok(recommendation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{candles_from_closes, MarketScenario, SyntheticDataGenerator};
    use crate::models::{Action, Signal, Timeframe};
    use crate::strategy::{RsiMomentumStrategy, StrategiesConfig, Strategy, StrategyError};
    use std::sync::Arc;

    struct FailingStrategy;

    impl Strategy for FailingStrategy {
        fn evaluate(&self, _window: &[Candle]) -> std::result::Result<Signal, StrategyError> {
            Err(StrategyError::new("boom"))
        }

        fn id(&self) -> &str {
            "failing"
        }

        fn min_candles_required(&self) -> usize {
            1
        }
    }

    fn default_engine() -> RecommendationEngine {
        let registry = StrategyRegistry::from_config(&StrategiesConfig::default()).unwrap();
        RecommendationEngine::with_defaults(registry, StrategyWeights::new()).unwrap()
    }

    #[test]
    fn test_recommend_on_synthetic_series() {
        let engine = default_engine();
        let candles = SyntheticDataGenerator::new(7).generate(MarketScenario::Uptrend, 120);

        let rec = engine.recommend(&candles).unwrap();
        assert_eq!(rec.symbol, "SYNTH");
        assert_eq!(rec.timestamp, candles.last().unwrap().open_time);
        assert_eq!(rec.signals.len(), 3);
        assert!((0.0..=1.0).contains(&rec.confidence));
    }

    #[test]
    fn test_recommend_rejects_unsorted_series() {
        let engine = default_engine();
        let mut candles = candles_from_closes("SOL", Timeframe::H1, &[1.0, 2.0, 3.0]);
        candles.reverse();
        assert!(matches!(
            engine.recommend(&candles),
            Err(CoreError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn test_short_history_holds() {
        let engine = default_engine();
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0, 101.0, 102.0]);

        let rec = engine.recommend(&candles).unwrap();
        assert_eq!(rec.action, Action::Hold);
        assert_eq!(rec.confidence, 0.0);
    }

    #[test]
    fn test_strategy_error_names_strategy_and_index() {
        let registry = StrategyRegistry::new()
            .with(Arc::new(RsiMomentumStrategy::default()))
            .and_then(|r| r.with(Arc::new(FailingStrategy)))
            .unwrap();
        let engine = RecommendationEngine::with_defaults(registry, StrategyWeights::new()).unwrap();
        let candles = candles_from_closes("SOL", Timeframe::H1, &[100.0; 5]);

        match engine.evaluate(&candles, 4) {
            Err(CoreError::Strategy { strategy, index, .. }) => {
                assert_eq!(strategy, "failing");
                assert_eq!(index, 4);
            }
            other => panic!("expected strategy error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_weights_rejected_up_front() {
        let registry = StrategyRegistry::from_config(&StrategiesConfig::default()).unwrap();
        let weights = StrategyWeights::new().with("rsi_momentum", f64::NAN);
        assert!(RecommendationEngine::with_defaults(registry, weights).is_err());
    }

    #[test]
    fn test_warmup_index() {
        assert_eq!(default_engine().warmup_index(), 29);
    }

    #[test]
    fn test_window_len_never_below_lookbacks() {
        let engine = default_engine();
        assert_eq!(engine.window_len(), 250);

        // ma_crossover needs 30, the classifier 21
        let narrow = engine.with_max_window(10).unwrap();
        assert_eq!(narrow.window_len(), 30);
        assert_eq!(narrow.with_weights(StrategyWeights::new()).unwrap().window_len(), 30);

        assert!(default_engine().with_max_window(0).is_err());
    }

    #[test]
    fn test_long_history_matches_trailing_window() {
        let engine = default_engine().with_max_window(60).unwrap();
        let candles = SyntheticDataGenerator::new(3).generate(MarketScenario::Volatile, 400);

        let from_history = engine.evaluate(&candles, 399).unwrap();
        let from_tail = engine.evaluate(&candles[340..], 399).unwrap();
        assert_eq!(from_history, from_tail);
    }
}
