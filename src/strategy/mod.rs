// Trading strategy module
pub mod crossover;
pub mod mean_reversion;
pub mod momentum;
pub mod registry;
pub mod signals;

use crate::models::{Candle, Signal};
use thiserror::Error;

pub use crossover::{AverageKind, MaCrossoverConfig, MaCrossoverStrategy};
pub use mean_reversion::{BollingerBandConfig, BollingerBandStrategy};
pub use momentum::{RsiMomentumConfig, RsiMomentumStrategy};
pub use registry::{create_strategy, StrategiesConfig, StrategyRegistry, STRATEGY_IDS};

/// Failure inside one strategy's indicator computation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct StrategyError {
    pub reason: String,
}

impl StrategyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Base trait for all trading strategies
///
/// `window` holds the trailing candles up to and including the evaluation
/// point, oldest first, and is at least `min_candles_required` long once the
/// series allows it. Implementations must be pure: the same window always yields the same
/// signal, and nothing is remembered between calls.
pub trait Strategy: Send + Sync {
    /// Produce this strategy's opinion for the last candle of `window`
    ///
    /// A window shorter than `min_candles_required` yields HOLD with zero
    /// confidence rather than an error.
    fn evaluate(&self, window: &[Candle]) -> Result<Signal, StrategyError>;

    /// Identifier used for weights and audit trails
    fn id(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
