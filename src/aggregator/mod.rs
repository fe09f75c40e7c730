/// Signal aggregation
///
/// Fuses per-strategy signals into one recommendation by weighted vote:
/// every signal adds `weight × confidence` to the score of its action and the
/// best score wins. Ties are settled by an explicit ranking (HOLD first), never
/// by iteration order.
use crate::error::CoreError;
use crate::models::{
    clamp_confidence, Action, MarketConditions, Recommendation, Signal, StrategyWeights,
    Timeframe,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How the protective stop is placed around the evaluation close
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopPolicy {
    /// Fixed fraction of the close (0.02 = 2%)
    FixedPct { pct: f64 },
    /// Multiple of the window's ATR
    AtrMultiple { multiple: f64 },
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy::FixedPct { pct: 0.02 }
    }
}

impl StopPolicy {
    /// Stop price for a position opened by `action` at `close`
    fn stop_for(&self, action: Action, close: f64, atr: Option<f64>) -> Option<f64> {
        let offset = match *self {
            StopPolicy::FixedPct { pct } => close * pct,
            StopPolicy::AtrMultiple { multiple } => atr? * multiple,
        };
        let stop = match action {
            Action::Buy => close - offset,
            Action::Sell => close + offset,
            Action::Hold => return None,
        };
        (stop.is_finite() && stop > 0.0).then_some(stop)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Weight for strategies missing from the weight map
    pub default_weight: f64,
    /// Resolve an exact BUY/SELL score tie to BUY instead of HOLD
    pub buy_on_directional_tie: bool,
    pub stop: StopPolicy,
    /// Directional winners below this confidence become HOLD
    pub min_confidence: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            default_weight: 1.0,
            buy_on_directional_tie: false,
            stop: StopPolicy::default(),
            min_confidence: 0.0,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.default_weight.is_finite() || self.default_weight < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "aggregator.default_weight must be finite and non-negative, got {}",
                self.default_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(CoreError::invalid_config(
                "aggregator.min_confidence must be in [0, 1]",
            ));
        }
        match self.stop {
            StopPolicy::FixedPct { pct } if !(pct > 0.0 && pct < 1.0) => Err(
                CoreError::invalid_config("aggregator.stop.pct must be in (0, 1)"),
            ),
            StopPolicy::AtrMultiple { multiple } if !(multiple > 0.0 && multiple.is_finite()) => {
                Err(CoreError::invalid_config(
                    "aggregator.stop.multiple must be positive",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Identity and market state of the candle being evaluated
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub atr: Option<f64>,
    pub market_conditions: MarketConditions,
}

/// Weighted score per action
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Tally {
    buy: f64,
    sell: f64,
    hold: f64,
}

impl Tally {
    fn add(&mut self, action: Action, score: f64) {
        match action {
            Action::Buy => self.buy += score,
            Action::Sell => self.sell += score,
            Action::Hold => self.hold += score,
        }
    }

    fn score(&self, action: Action) -> f64 {
        match action {
            Action::Buy => self.buy,
            Action::Sell => self.sell,
            Action::Hold => self.hold,
        }
    }
}

/// Preference between actions whose scores are equal
fn tie_rank(action: Action) -> u8 {
    match action {
        Action::Hold => 2,
        Action::Buy => 1,
        Action::Sell => 0,
    }
}

/// Total order over (action, score): higher score first, then tie rank
pub fn compare_votes(a: (Action, f64), b: (Action, f64)) -> Ordering {
    a.1.total_cmp(&b.1)
        .then_with(|| tie_rank(a.0).cmp(&tie_rank(b.0)))
}

#[derive(Debug, Clone, Default)]
pub struct SignalAggregator {
    config: AggregatorConfig,
}

impl SignalAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    fn weight_for(&self, strategy: &str, weights: &StrategyWeights) -> Result<f64> {
        let weight = weights.get(strategy).unwrap_or(self.config.default_weight);
        if !weight.is_finite() || weight < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "weight for strategy '{}' must be finite and non-negative, got {}",
                strategy, weight
            )));
        }
        Ok(weight)
    }

    /// Pick the winning action from the tally
    fn resolve(&self, tally: &Tally) -> Action {
        let winner = [Action::Buy, Action::Sell, Action::Hold]
            .into_iter()
            .map(|a| (a, tally.score(a)))
            .max_by(|a, b| compare_votes(*a, *b))
            .map(|(a, _)| a)
            .unwrap_or(Action::Hold);

        // Exact directional tie is only a BUY when configured so
        if winner == Action::Buy
            && tally.buy == tally.sell
            && !self.config.buy_on_directional_tie
        {
            return Action::Hold;
        }
        winner
    }

    /// Fuse signals into a recommendation
    ///
    /// Negative or non-finite weights are a configuration error. A zero total
    /// weight yields HOLD with zero confidence.
    pub fn aggregate(
        &self,
        signals: &[Signal],
        weights: &StrategyWeights,
        ctx: &EvaluationContext,
    ) -> Result<Recommendation> {
        if let Some((strategy, weight)) = weights.first_invalid() {
            return Err(CoreError::invalid_config(format!(
                "weight for strategy '{}' must be finite and non-negative, got {}",
                strategy, weight
            )));
        }

        let mut tally = Tally::default();
        let mut weight_sum = 0.0;
        for signal in signals {
            let weight = self.weight_for(&signal.strategy, weights)?;
            tally.add(signal.action, weight * clamp_confidence(signal.confidence));
            weight_sum += weight;
        }

        if weight_sum <= 0.0 {
            tracing::warn!(
                "{} {}: total strategy weight is zero, holding",
                ctx.symbol,
                ctx.timestamp
            );
            return Ok(self.recommendation(ctx, Action::Hold, 0.0, None, None, signals));
        }

        let mut action = self.resolve(&tally);
        let mut confidence = clamp_confidence(tally.score(action) / weight_sum);

        if action.is_directional() && confidence < self.config.min_confidence {
            tracing::debug!(
                "{} {}: {} confidence {:.3} below minimum {:.3}, holding",
                ctx.symbol,
                ctx.timestamp,
                action,
                confidence,
                self.config.min_confidence
            );
            action = Action::Hold;
            confidence = clamp_confidence(tally.hold / weight_sum);
        }

        let price_target = if action.is_directional() {
            mean_target(signals, action)
        } else {
            None
        };
        let stop_loss = price_target.and_then(|_| self.config.stop.stop_for(action, ctx.close, ctx.atr));

        tracing::debug!(
            "{} {}: BUY={:.3} SELL={:.3} HOLD={:.3} (weight {:.3}) -> {} {:.3}",
            ctx.symbol,
            ctx.timestamp,
            tally.buy,
            tally.sell,
            tally.hold,
            weight_sum,
            action,
            confidence
        );

        Ok(self.recommendation(ctx, action, confidence, price_target, stop_loss, signals))
    }

    fn recommendation(
        &self,
        ctx: &EvaluationContext,
        action: Action,
        confidence: f64,
        price_target: Option<f64>,
        stop_loss: Option<f64>,
        signals: &[Signal],
    ) -> Recommendation {
        Recommendation {
            symbol: ctx.symbol.clone(),
            timeframe: ctx.timeframe,
            timestamp: ctx.timestamp,
            action,
            confidence,
            close: ctx.close,
            price_target,
            stop_loss,
            signals: signals.to_vec(),
            market_conditions: ctx.market_conditions,
        }
    }
}

/// Mean of the targets projected by strategies that voted for `action`
fn mean_target(signals: &[Signal], action: Action) -> Option<f64> {
    let targets: Vec<f64> = signals
        .iter()
        .filter(|s| s.action == action)
        .filter_map(|s| s.price_target)
        .collect();

    if targets.is_empty() {
        None
    } else {
        Some(targets.iter().sum::<f64>() / targets.len() as f64)
    }
}
