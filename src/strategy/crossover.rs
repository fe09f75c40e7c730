use super::signals::extract_closes;
use super::{Strategy, StrategyError};
use crate::indicators::{calculate_atr, calculate_ema, calculate_sma};
use crate::models::{Action, Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AverageKind {
    #[default]
    Sma,
    Ema,
}

impl AverageKind {
    fn compute(&self, prices: &[f64], period: usize) -> Option<f64> {
        match self {
            AverageKind::Sma => calculate_sma(prices, period),
            AverageKind::Ema => calculate_ema(prices, period),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AverageKind::Sma => "SMA",
            AverageKind::Ema => "EMA",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaCrossoverConfig {
    pub average: AverageKind,
    pub fast_period: usize,
    pub slow_period: usize,
    /// Relative spread below which the averages count as crossed-over noise
    pub min_spread: f64,
    /// Relative spread at which a directional signal reaches full confidence
    pub full_confidence_spread: f64,
    pub atr_period: usize,
    /// Projected move in ATRs from the close
    pub target_atr_multiple: f64,
}

impl Default for MaCrossoverConfig {
    fn default() -> Self {
        Self {
            average: AverageKind::Sma,
            fast_period: 10,
            slow_period: 30,
            min_spread: 0.001,
            full_confidence_spread: 0.02,
            atr_period: 14,
            target_atr_multiple: 2.0,
        }
    }
}

impl MaCrossoverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.fast_period == 0 || self.atr_period == 0 {
            return Err("ma_crossover periods must be positive".to_string());
        }
        if self.fast_period >= self.slow_period {
            return Err(format!(
                "ma_crossover.fast_period ({}) must be below slow_period ({})",
                self.fast_period, self.slow_period
            ));
        }
        if !(self.min_spread >= 0.0 && self.full_confidence_spread > self.min_spread) {
            return Err(
                "ma_crossover.full_confidence_spread must exceed a non-negative min_spread"
                    .to_string(),
            );
        }
        if !(self.target_atr_multiple >= 0.0) {
            return Err("ma_crossover.target_atr_multiple must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Dual moving-average trend strategy
///
/// Fast average above slow average is an uptrend (BUY), below is a downtrend
/// (SELL). Averages are SMAs unless configured as EMAs.
/// Confidence scales with the relative gap between the two averages.
#[derive(Debug, Clone)]
pub struct MaCrossoverStrategy {
    config: MaCrossoverConfig,
}

impl MaCrossoverStrategy {
    pub const ID: &'static str = "ma_crossover";

    pub fn new(config: MaCrossoverConfig) -> Self {
        Self { config }
    }
}

impl Default for MaCrossoverStrategy {
    fn default() -> Self {
        Self::new(MaCrossoverConfig::default())
    }
}

impl Strategy for MaCrossoverStrategy {
    fn evaluate(&self, window: &[Candle]) -> Result<Signal, StrategyError> {
        let need = self.min_candles_required();
        if window.len() < need {
            return Ok(Signal::insufficient_history(Self::ID, window.len(), need));
        }

        let cfg = &self.config;
        let prices = extract_closes(window)?;
        let kind = cfg.average.label();
        let fast = cfg
            .average
            .compute(&prices, cfg.fast_period)
            .ok_or_else(|| StrategyError::new(format!("failed to calculate fast {}", kind)))?;
        let slow = cfg
            .average
            .compute(&prices, cfg.slow_period)
            .ok_or_else(|| StrategyError::new(format!("failed to calculate slow {}", kind)))?;
        if slow <= 0.0 {
            return Err(StrategyError::new(format!("slow {} is {}", kind, slow)));
        }

        let close = prices[prices.len() - 1];
        let spread = (fast - slow) / slow;

        let (action, confidence) = if spread.abs() < cfg.min_spread {
            (Action::Hold, 0.5 * (1.0 - spread.abs() / cfg.min_spread))
        } else if spread > 0.0 {
            (Action::Buy, spread / cfg.full_confidence_spread)
        } else {
            (Action::Sell, -spread / cfg.full_confidence_spread)
        };

        let target = calculate_atr(window, cfg.atr_period).and_then(|atr| match action {
            Action::Buy => Some(close + atr * cfg.target_atr_multiple),
            Action::Sell => Some(close - atr * cfg.target_atr_multiple),
            Action::Hold => None,
        });

        tracing::debug!(
            "{}: fast={:.4} slow={:.4} spread={:.3}% -> {}",
            Self::ID,
            fast,
            slow,
            spread * 100.0,
            action
        );

        Ok(Signal::new(Self::ID, action, confidence)
            .with_rationale(format!(
                "{}({})={:.4} vs {}({})={:.4}",
                kind, cfg.fast_period, fast, kind, cfg.slow_period, slow
            ))
            .with_target(target))
    }

    fn id(&self) -> &str {
        Self::ID
    }

    fn min_candles_required(&self) -> usize {
        self.config.slow_period.max(self.config.atr_period + 1)
    }
}
