use super::signals::extract_closes;
use super::{Strategy, StrategyError};
use crate::indicators::calculate_bollinger;
use crate::models::{Action, Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BollingerBandConfig {
    /// Moving average period for the middle band
    pub period: usize,

    /// Band half-width in standard deviations
    pub std_dev_multiplier: f64,

    /// How close to a band edge (in %b units) counts as touching it
    pub entry_band: f64,
}

impl Default for BollingerBandConfig {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
            entry_band: 0.05,
        }
    }
}

impl BollingerBandConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.period < 2 {
            return Err("bollinger_band.period must be at least 2".to_string());
        }
        if !(self.std_dev_multiplier > 0.0) {
            return Err("bollinger_band.std_dev_multiplier must be positive".to_string());
        }
        if !(0.0..0.5).contains(&self.entry_band) {
            return Err("bollinger_band.entry_band must be in [0, 0.5)".to_string());
        }
        Ok(())
    }
}

/// Volatility band mean reversion strategy
///
/// Buys closes at or below the lower Bollinger band and sells closes at or above
/// the upper band, projecting a return to the middle band. Anything inside the
/// bands is a HOLD, most confident right at the middle.
#[derive(Debug, Clone)]
pub struct BollingerBandStrategy {
    config: BollingerBandConfig,
}

impl BollingerBandStrategy {
    pub const ID: &'static str = "bollinger_band";

    pub fn new(config: BollingerBandConfig) -> Self {
        Self { config }
    }
}

impl Default for BollingerBandStrategy {
    fn default() -> Self {
        Self::new(BollingerBandConfig::default())
    }
}

impl Strategy for BollingerBandStrategy {
    fn evaluate(&self, window: &[Candle]) -> Result<Signal, StrategyError> {
        let need = self.min_candles_required();
        if window.len() < need {
            return Ok(Signal::insufficient_history(Self::ID, window.len(), need));
        }

        let cfg = &self.config;
        let prices = extract_closes(window)?;
        let bands = calculate_bollinger(&prices, cfg.period, cfg.std_dev_multiplier)
            .ok_or_else(|| StrategyError::new("failed to calculate Bollinger bands"))?;
        let close = prices[prices.len() - 1];

        let Some(percent_b) = bands.percent_b(close) else {
            return Ok(Signal::new(Self::ID, Action::Hold, 0.0)
                .with_rationale("Bollinger bands collapsed (zero volatility)"));
        };

        let upper_edge = 1.0 - cfg.entry_band;
        let (action, confidence) = if percent_b <= cfg.entry_band {
            (Action::Buy, 0.5 + (cfg.entry_band - percent_b))
        } else if percent_b >= upper_edge {
            (Action::Sell, 0.5 + (percent_b - upper_edge))
        } else {
            (Action::Hold, 0.5 * (1.0 - (percent_b - 0.5).abs() * 2.0))
        };

        tracing::debug!(
            "{}: close={:.4} lower={:.4} middle={:.4} upper={:.4} %b={:.2} -> {}",
            Self::ID,
            close,
            bands.lower,
            bands.middle,
            bands.upper,
            percent_b,
            action
        );

        let target = action.is_directional().then_some(bands.middle);

        Ok(Signal::new(Self::ID, action, confidence)
            .with_rationale(format!("%b={:.2}", percent_b))
            .with_target(target))
    }

    fn id(&self) -> &str {
        Self::ID
    }

    fn min_candles_required(&self) -> usize {
        self.config.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::candles_from_closes;
    use crate::models::Timeframe;

    fn candles(prices: &[f64]) -> Vec<Candle> {
        candles_from_closes("TEST", Timeframe::H1, prices)
    }

    #[test]
    fn test_requires_minimum_candles() {
        let strategy = BollingerBandStrategy::default();
        let signal = strategy.evaluate(&candles(&[100.0; 10])).unwrap();
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn test_buy_on_extreme_dip() {
        let strategy = BollingerBandStrategy::default();

        // Quiet market then a sharp drop below the lower band
        let mut prices: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        prices.push(90.0);

        let signal = strategy.evaluate(&candles(&prices)).unwrap();
        assert_eq!(signal.action, Action::Buy);
        assert!(signal.confidence >= 0.5);
        let target = signal.price_target.unwrap();
        assert!(target > 90.0 && target < 101.0);
    }

    #[test]
    fn test_sell_on_spike() {
        let strategy = BollingerBandStrategy::default();

        let mut prices: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        prices.push(112.0);

        let signal = strategy.evaluate(&candles(&prices)).unwrap();
        assert_eq!(signal.action, Action::Sell);
        assert!(signal.price_target.unwrap() < 112.0);
    }

    #[test]
    fn test_inside_bands_holds() {
        let strategy = BollingerBandStrategy::default();
        let prices: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();

        let signal = strategy.evaluate(&candles(&prices)).unwrap();
        assert_eq!(signal.action, Action::Hold);
        assert!(signal.price_target.is_none());
    }

    #[test]
    fn test_flat_prices_hold_with_zero_confidence() {
        let strategy = BollingerBandStrategy::default();
        let signal = strategy.evaluate(&candles(&[100.0; 25])).unwrap();
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.confidence, 0.0);
    }
}
