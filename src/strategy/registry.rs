//! Strategy registry
//!
//! Explicit, ordered collection of strategy instances keyed by id. Built from
//! configuration and handed to the engine; there is no global lookup.

use super::{
    BollingerBandConfig, BollingerBandStrategy, MaCrossoverConfig, MaCrossoverStrategy,
    RsiMomentumConfig, RsiMomentumStrategy, Strategy,
};
use crate::error::CoreError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available strategy ids
pub const STRATEGY_IDS: &[&str] = &[
    RsiMomentumStrategy::ID,
    MaCrossoverStrategy::ID,
    BollingerBandStrategy::ID,
];

/// Per-strategy parameters plus which strategies are switched on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategiesConfig {
    pub enabled: Vec<String>,
    pub rsi_momentum: RsiMomentumConfig,
    pub ma_crossover: MaCrossoverConfig,
    pub bollinger_band: BollingerBandConfig,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            enabled: STRATEGY_IDS.iter().map(|s| s.to_string()).collect(),
            rsi_momentum: RsiMomentumConfig::default(),
            ma_crossover: MaCrossoverConfig::default(),
            bollinger_band: BollingerBandConfig::default(),
        }
    }
}

impl StrategiesConfig {
    pub fn validate(&self) -> Result<()> {
        self.rsi_momentum
            .validate()
            .and_then(|_| self.ma_crossover.validate())
            .and_then(|_| self.bollinger_band.validate())
            .map_err(CoreError::invalid_config)
    }
}

/// Create a strategy by id
pub fn create_strategy(id: &str, config: &StrategiesConfig) -> Option<Arc<dyn Strategy>> {
    match id {
        RsiMomentumStrategy::ID => Some(Arc::new(RsiMomentumStrategy::new(
            config.rsi_momentum.clone(),
        ))),
        MaCrossoverStrategy::ID => Some(Arc::new(MaCrossoverStrategy::new(
            config.ma_crossover.clone(),
        ))),
        BollingerBandStrategy::ID => Some(Arc::new(BollingerBandStrategy::new(
            config.bollinger_band.clone(),
        ))),
        _ => None,
    }
}

/// Ordered set of strategies, evaluated in registration order
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the enabled strategies from configuration
    pub fn from_config(config: &StrategiesConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = Self::new();
        for id in &config.enabled {
            let strategy = create_strategy(id, config).ok_or_else(|| {
                CoreError::invalid_config(format!(
                    "unknown strategy '{}' (available: {})",
                    id,
                    STRATEGY_IDS.join(", ")
                ))
            })?;
            registry.register(strategy)?;
        }

        Ok(registry)
    }

    /// Add a strategy; ids must be unique
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> Result<()> {
        if self.get(strategy.id()).is_some() {
            return Err(CoreError::invalid_config(format!(
                "strategy '{}' registered twice",
                strategy.id()
            )));
        }
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn with(mut self, strategy: Arc<dyn Strategy>) -> Result<Self> {
        self.register(strategy)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Strategy>> {
        self.strategies.iter().find(|s| s.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Longest minimum look-back across the registered strategies
    pub fn max_lookback(&self) -> usize {
        self.strategies
            .iter()
            .map(|s| s.min_candles_required())
            .max()
            .unwrap_or(1)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.ids())
            .finish()
    }
}
