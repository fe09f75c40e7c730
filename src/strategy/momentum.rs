use super::signals::extract_closes;
use super::{Strategy, StrategyError};
use crate::indicators::{calculate_rsi, calculate_sma};
use crate::models::{Action, Candle, Signal};
use serde::{Deserialize, Serialize};

/// Configuration for the RSI momentum oscillator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RsiMomentumConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Confidence of a HOLD when RSI sits exactly at 50
    pub neutral_confidence: f64,
}

impl Default for RsiMomentumConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            neutral_confidence: 0.5,
        }
    }
}

impl RsiMomentumConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.rsi_period == 0 {
            return Err("rsi_momentum.rsi_period must be positive".to_string());
        }
        if !(0.0 < self.rsi_oversold && self.rsi_oversold < 50.0) {
            return Err("rsi_momentum.rsi_oversold must be in (0, 50)".to_string());
        }
        if !(50.0 < self.rsi_overbought && self.rsi_overbought < 100.0) {
            return Err("rsi_momentum.rsi_overbought must be in (50, 100)".to_string());
        }
        if !(0.0..=1.0).contains(&self.neutral_confidence) {
            return Err("rsi_momentum.neutral_confidence must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Momentum oscillator strategy
///
/// Reads RSI against oversold/overbought thresholds:
/// - RSI at or below oversold: BUY, more confident the deeper it goes
/// - RSI at or above overbought: SELL, likewise
/// - in between: HOLD, most confident at RSI 50
///
/// Directional signals project a reversion target at the SMA of the same period.
#[derive(Debug, Clone)]
pub struct RsiMomentumStrategy {
    config: RsiMomentumConfig,
}

impl RsiMomentumStrategy {
    pub const ID: &'static str = "rsi_momentum";

    pub fn new(config: RsiMomentumConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RsiMomentumConfig {
        &self.config
    }

    fn classify(&self, rsi: f64) -> (Action, f64) {
        let cfg = &self.config;
        if rsi <= cfg.rsi_oversold {
            let depth = (cfg.rsi_oversold - rsi) / cfg.rsi_oversold;
            (Action::Buy, 0.5 + 0.5 * depth)
        } else if rsi >= cfg.rsi_overbought {
            let depth = (rsi - cfg.rsi_overbought) / (100.0 - cfg.rsi_overbought);
            (Action::Sell, 0.5 + 0.5 * depth)
        } else {
            // Linear falloff from 50 to whichever threshold is on this side
            let closeness = if rsi < 50.0 {
                (rsi - cfg.rsi_oversold) / (50.0 - cfg.rsi_oversold)
            } else {
                (cfg.rsi_overbought - rsi) / (cfg.rsi_overbought - 50.0)
            };
            (Action::Hold, cfg.neutral_confidence * closeness)
        }
    }
}

impl Default for RsiMomentumStrategy {
    fn default() -> Self {
        Self::new(RsiMomentumConfig::default())
    }
}

impl Strategy for RsiMomentumStrategy {
    fn evaluate(&self, window: &[Candle]) -> Result<Signal, StrategyError> {
        let need = self.min_candles_required();
        if window.len() < need {
            return Ok(Signal::insufficient_history(Self::ID, window.len(), need));
        }

        let prices = extract_closes(window)?;
        let period = self.config.rsi_period;
        let rsi = calculate_rsi(&prices, period)
            .ok_or_else(|| StrategyError::new("failed to calculate RSI"))?;
        let mean = calculate_sma(&prices, period)
            .ok_or_else(|| StrategyError::new("failed to calculate SMA"))?;
        let close = prices[prices.len() - 1];

        let (action, confidence) = self.classify(rsi);

        // Only project a target that lies on the profitable side
        let target = match action {
            Action::Buy if mean > close => Some(mean),
            Action::Sell if mean < close => Some(mean),
            _ => None,
        };

        tracing::debug!(
            "{}: RSI={:.1} SMA={:.4} close={:.4} -> {} ({:.2})",
            Self::ID,
            rsi,
            mean,
            close,
            action,
            confidence
        );

        Ok(Signal::new(Self::ID, action, confidence)
            .with_rationale(format!(
                "RSI({})={:.1} vs {:.0}/{:.0}",
                period, rsi, self.config.rsi_oversold, self.config.rsi_overbought
            ))
            .with_target(target))
    }

    fn id(&self) -> &str {
        Self::ID
    }

    fn min_candles_required(&self) -> usize {
        self.config.rsi_period + 1
    }
}
